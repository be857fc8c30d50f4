use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info};
use url::Url;

use crate::models::{Listing, Snapshot, TotalCount, DATE_UNSPECIFIED, PRICE_UNSPECIFIED};
use crate::parsers::{clean_text, Extraction, ListingExtractor};

pub const AVITO_BASE_URL: &str = "https://www.avito.ru";

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|_| panic!("Invalid selector: {}", css))
}

fn selectors(css: &[&str]) -> Vec<Selector> {
    css.iter().map(|s| selector(s)).collect()
}

static TOTAL_COUNT: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[
        r#"span[data-marker="page-title/count"]"#,
        "span.page-title-count-",
        "span.page-title-count",
    ])
});

static EMPTY_SEARCH: Lazy<Selector> = Lazy::new(|| selector(r#"div[data-marker="empty-search"]"#));

static ITEMS: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[r#"div[data-marker="item"]"#, "div.iva-item-root", "div.items-items"])
});

static TITLE: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[
        r#"h3[itemprop="name"]"#,
        r#"a[data-marker="item-title"]"#,
        "div.title-root",
    ])
});

static TITLE_LINK: Lazy<Selector> = Lazy::new(|| selector(r#"a[data-marker="item-title"]"#));

static DATE: Lazy<Selector> = Lazy::new(|| {
    selector(r#"div[data-marker="item-date"], p[data-marker="item-date"]"#)
});

static PRICE_TEXT: Lazy<Selector> = Lazy::new(|| selector(r#"span[data-marker="item-price"]"#));

static PRICE_META: Lazy<Selector> = Lazy::new(|| selector(r#"meta[itemprop="price"]"#));

static IMAGE: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[r#"img[itemprop="image"]"#, r#"img[data-marker="item-photo"]"#])
});

/// Extracts listings from Avito search-results markup.
pub struct AvitoExtractor {
    base_url: Url,
}

impl AvitoExtractor {
    pub fn new() -> Self {
        Self::with_base_url(AVITO_BASE_URL).expect("Invalid Avito base url")
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
        })
    }

    fn parse_item(&self, item: ElementRef<'_>) -> Option<Listing> {
        let title_elem = first_match(item, &TITLE)?;
        let title = clean_text(&title_elem.text().collect::<String>());

        let posted_at = item
            .select(&DATE)
            .next()
            .map(|date| clean_text(&date.text().collect::<String>()))
            .filter(|date| !date.is_empty())
            .unwrap_or_else(|| DATE_UNSPECIFIED.to_string());

        let price = item
            .select(&PRICE_TEXT)
            .next()
            .map(|price| clean_text(&price.text().collect::<String>()))
            .or_else(|| {
                item.select(&PRICE_META).next().map(|meta| {
                    format!("{} ₽", meta.value().attr("content").unwrap_or_default().trim())
                })
            })
            .unwrap_or_else(|| PRICE_UNSPECIFIED.to_string());

        let image_url = first_match(item, &IMAGE).and_then(|img| {
            ["src", "data-src"]
                .iter()
                .find_map(|attr| img.value().attr(attr))
                .map(absolute_image_url)
        });

        let href = if title_elem.value().name() == "a" {
            title_elem.value().attr("href")
        } else {
            item.select(&TITLE_LINK)
                .next()
                .and_then(|link| link.value().attr("href"))
        }?;
        let url = self.base_url.join(href.trim()).ok()?.to_string();

        Some(Listing {
            title,
            posted_at,
            price,
            url,
            image_url,
        })
    }
}

impl Default for AvitoExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingExtractor for AvitoExtractor {
    fn extract(&self, html: &str) -> Extraction {
        let document = Html::parse_document(html);

        if document.select(&EMPTY_SEARCH).next().is_some() {
            info!("Empty search results found");
            return Extraction::EmptySearch;
        }

        let total_count = TOTAL_COUNT
            .iter()
            .find_map(|s| document.select(s).next())
            .map(|count| clean_text(&count.text().collect::<String>()))
            .filter(|count| !count.is_empty())
            .map(TotalCount::Known)
            .unwrap_or(TotalCount::Unknown);

        let items = ITEMS
            .iter()
            .map(|s| document.select(s).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        info!("Found {} items on the page", items.len());

        let mut seen = HashSet::new();
        let mut listings = Vec::new();
        for item in items {
            match self.parse_item(item) {
                Some(listing) if seen.insert(listing.url.clone()) => {
                    debug!("Added listing: {}", listing.title);
                    listings.push(listing);
                }
                Some(listing) => debug!("Skipping duplicate listing {}", listing.url),
                None => debug!("Skipping item without title or link"),
            }
        }

        info!("Successfully extracted {} listings", listings.len());
        Extraction::Listings(Snapshot::new(listings, total_count))
    }
}

fn first_match<'a>(element: ElementRef<'a>, candidates: &[Selector]) -> Option<ElementRef<'a>> {
    candidates.iter().find_map(|s| element.select(s).next())
}

fn absolute_image_url(src: &str) -> String {
    let src = src.trim();
    if src.starts_with("//") {
        format!("https:{}", src)
    } else {
        src.to_string()
    }
}
