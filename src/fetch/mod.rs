use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use url::Url;

mod http;
pub use http::HttpFetcher;

/// Raw markup returned by a fetch, along with the URL the fetch landed on
/// after redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub final_url: String,
    pub html: String,
}

impl Page {
    pub fn new(final_url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            final_url: final_url.into(),
            html: html.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("timed out fetching {0}")]
    Timeout(String),
    #[error("blocked while fetching {url}: {reason}")]
    Blocked { url: String, reason: String },
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError>;
}

const BLOCKED_PATH_MARKERS: &[&str] = &["blocked", "error", "captcha"];

static CHALLENGE_MARKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)firewall-(?:title|container)|доступ ограничен|<form[^>]*captcha|data-marker="captcha"#)
        .expect("Invalid challenge regex")
});

/// Returns the reason a fetched page looks like a block, error or challenge
/// page rather than search results.
pub fn detect_block(page: &Page) -> Option<String> {
    if let Ok(landed) = Url::parse(&page.final_url) {
        let path = landed.path().to_lowercase();
        if let Some(marker) = BLOCKED_PATH_MARKERS.iter().find(|m| path.contains(*m)) {
            return Some(format!("redirected to a {} page ({})", marker, page.final_url));
        }
    }

    CHALLENGE_MARKUP
        .find(&page.html)
        .map(|found| format!("challenge markup detected: {}", found.as_str()))
}
