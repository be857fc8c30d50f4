use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::fetch::{detect_block, FetchError, PageFetcher};
use crate::models::Snapshot;
use crate::parsers::{Extraction, ListingExtractor};
use crate::utils::url::normalize_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(10),
        }
    }
}

/// Why a single fetch-and-extract attempt did not produce a snapshot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{0}")]
    Blocked(String),
    #[error("no listings recognised on the page")]
    NoListings,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid search url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("no snapshot for {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: AttemptFailure,
    },
}

/// Fetches a search page and extracts its listings, retrying transient
/// failures with a fixed delay between attempts.
pub struct SnapshotFetcher {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn ListingExtractor>,
    policy: RetryPolicy,
}

impl SnapshotFetcher {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn ListingExtractor>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            policy,
        }
    }

    pub async fn fetch_snapshot(&self, url: &str) -> Result<Snapshot, SnapshotError> {
        let url = normalize_url(url).map_err(|source| SnapshotError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let attempts = self.policy.max_retries.max(1);
        let mut last = AttemptFailure::NoListings;

        for attempt in 1..=attempts {
            match self.attempt(&url).await {
                Ok(snapshot) => {
                    info!(
                        "Got {} listings from {} (total: {})",
                        snapshot.listings.len(),
                        url,
                        snapshot.total_count
                    );
                    return Ok(snapshot);
                }
                Err(failure) => {
                    warn!("Attempt {} of {} for {} failed: {}", attempt, attempts, url, failure);
                    last = failure;
                }
            }

            if attempt < attempts {
                sleep(self.policy.retry_delay).await;
            }
        }

        Err(SnapshotError::Exhausted {
            url,
            attempts,
            last,
        })
    }

    async fn attempt(&self, url: &str) -> Result<Snapshot, AttemptFailure> {
        let page = self.fetcher.fetch(url).await?;

        if let Some(reason) = detect_block(&page) {
            return Err(AttemptFailure::Blocked(reason));
        }

        match self.extractor.extract(&page.html) {
            Extraction::EmptySearch => Ok(Snapshot::empty()),
            Extraction::Listings(snapshot) if snapshot.is_empty() => Err(AttemptFailure::NoListings),
            Extraction::Listings(snapshot) => Ok(snapshot),
        }
    }
}
