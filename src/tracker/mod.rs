pub mod diff;
pub mod scheduler;
pub mod snapshot;

pub use diff::new_listings;
pub use scheduler::{CycleReport, Scheduler, SchedulerSettings, SubscriptionOutcome};
pub use snapshot::{AttemptFailure, RetryPolicy, SnapshotError, SnapshotFetcher};

use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{SubscriberId, TotalCount};
use crate::storage::SubscriptionStore;
use crate::utils::url::normalize_url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Accepted { url: String, total_count: TotalCount },
    AlreadyTracking(String),
    NoListingsFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped(String),
    NotTracking,
}

/// Entry point for starting and stopping tracking on behalf of subscribers.
pub struct TrackingService {
    store: Arc<SubscriptionStore>,
    snapshots: Arc<SnapshotFetcher>,
}

impl TrackingService {
    pub fn new(store: Arc<SubscriptionStore>, snapshots: Arc<SnapshotFetcher>) -> Self {
        Self { store, snapshots }
    }

    pub fn register(&self, subscriber: SubscriberId) {
        self.store.register(subscriber);
    }

    pub fn tracked_url(&self, subscriber: SubscriberId) -> Option<String> {
        self.store.tracked_url(subscriber)
    }

    /// Starts tracking `url` for `subscriber`.
    ///
    /// An existing tracked URL is only replaced when `replace` is set. The
    /// seen-set is seeded from a fresh snapshot; a search that yields no
    /// listings is refused so tracking never starts from an empty baseline.
    pub async fn start_tracking(
        &self,
        subscriber: SubscriberId,
        url: &str,
        replace: bool,
    ) -> StartOutcome {
        if !replace {
            if let Some(existing) = self.store.tracked_url(subscriber) {
                return StartOutcome::AlreadyTracking(existing);
            }
        }

        let url = match normalize_url(url) {
            Ok(url) => url,
            Err(e) => {
                warn!("Rejecting tracking request from {}: {}", subscriber, e);
                return StartOutcome::NoListingsFound;
            }
        };

        let snapshot = match self.snapshots.fetch_snapshot(&url).await {
            Ok(snapshot) if !snapshot.is_empty() => snapshot,
            Ok(_) => {
                info!("Search {} has no listings, not tracking it", url);
                return StartOutcome::NoListingsFound;
            }
            Err(e) => {
                warn!("Could not load initial listings for {}: {}", subscriber, e);
                return StartOutcome::NoListingsFound;
            }
        };

        self.store
            .start_tracking(subscriber, &url, &snapshot.listings);
        StartOutcome::Accepted {
            url,
            total_count: snapshot.total_count,
        }
    }

    pub fn stop_tracking(&self, subscriber: SubscriberId) -> StopOutcome {
        match self.store.stop_tracking(subscriber) {
            Some(previous) => StopOutcome::Stopped(previous),
            None => StopOutcome::NotTracking,
        }
    }
}
