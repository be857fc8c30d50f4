use std::collections::HashSet;
use std::fmt;

pub const DATE_UNSPECIFIED: &str = "Date not specified";
pub const PRICE_UNSPECIFIED: &str = "Price not specified";

/// One classifieds item as shown on a search-results page.
///
/// `url` is the identity of a listing. Two records with the same url are the
/// same listing even when title, price or date differ between fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub title: String,
    pub posted_at: String,
    pub price: String,
    pub url: String,
    pub image_url: Option<String>,
}

impl Listing {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            posted_at: DATE_UNSPECIFIED.to_string(),
            price: PRICE_UNSPECIFIED.to_string(),
            url: url.into(),
            image_url: None,
        }
    }

    pub fn with_posted_at(mut self, posted_at: impl Into<String>) -> Self {
        self.posted_at = posted_at.into();
        self
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = price.into();
        self
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

/// Approximate number of results the source reports for a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TotalCount {
    Known(String),
    Unknown,
}

impl fmt::Display for TotalCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TotalCount::Known(count) => write!(f, "{}", count),
            TotalCount::Unknown => write!(f, "unknown"),
        }
    }
}

/// Listings observed by a single fetch-and-extract pass, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub listings: Vec<Listing>,
    pub total_count: TotalCount,
}

impl Snapshot {
    pub fn new(listings: Vec<Listing>, total_count: TotalCount) -> Self {
        Self { listings, total_count }
    }

    /// Snapshot of a search the source explicitly reports as having no results.
    pub fn empty() -> Self {
        Self {
            listings: Vec::new(),
            total_count: TotalCount::Known("0".to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn urls(&self) -> HashSet<String> {
        listing_urls(&self.listings)
    }
}

pub fn listing_urls(listings: &[Listing]) -> HashSet<String> {
    listings.iter().map(|listing| listing.url.clone()).collect()
}
