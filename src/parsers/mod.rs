pub mod avito;

pub use avito::AvitoExtractor;

use html_escape::decode_html_entities;
use crate::models::Snapshot;

/// What an extractor recognised on a search-results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Listings found on the page. An empty snapshot here means the page did
    /// not match the expected layout.
    Listings(Snapshot),
    /// The page explicitly states that the search has no results.
    EmptySearch,
}

pub trait ListingExtractor: Send + Sync {
    fn extract(&self, html: &str) -> Extraction;
}

/// Clean and normalize text by removing extra whitespace and decoding HTML entities
pub fn clean_text(text: &str) -> String {
    let decoded = decode_html_entities(text);
    decoded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
