use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::models::{listing_urls, ActiveSubscription, Listing, SubscriberId, Subscription};

/// In-memory tracking state for all subscribers.
///
/// Every operation takes a single lock for its whole read-modify-write, so a
/// start or stop for a subscriber is never interleaved with a seen-set update
/// for the same subscriber. Writes coming from a scheduler cycle carry the
/// epoch they were computed against and are dropped if tracking was started
/// or stopped in the meantime.
#[derive(Debug, Default)]
pub struct SubscriptionStore {
    entries: Mutex<HashMap<SubscriberId, Subscription>>,
}

impl SubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<SubscriberId, Subscription>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates an untracked entry for a subscriber seen for the first time.
    pub fn register(&self, subscriber_id: SubscriberId) {
        self.entries()
            .entry(subscriber_id)
            .or_insert_with(|| Subscription::new(subscriber_id));
    }

    pub fn get(&self, subscriber_id: SubscriberId) -> Option<Subscription> {
        self.entries().get(&subscriber_id).cloned()
    }

    pub fn tracked_url(&self, subscriber_id: SubscriberId) -> Option<String> {
        self.entries()
            .get(&subscriber_id)
            .and_then(|subscription| subscription.tracked_url.clone())
    }

    /// Starts tracking `url`, replacing whatever was tracked before. The
    /// seen-set becomes exactly the urls of `seed`. Returns the replaced URL.
    pub fn start_tracking(
        &self,
        subscriber_id: SubscriberId,
        url: &str,
        seed: &[Listing],
    ) -> Option<String> {
        let mut entries = self.entries();
        let subscription = entries
            .entry(subscriber_id)
            .or_insert_with(|| Subscription::new(subscriber_id));

        let previous = subscription.tracked_url.replace(url.to_string());
        subscription.seen_urls = listing_urls(seed);
        subscription.epoch += 1;

        info!(
            "Subscriber {} now tracking {} ({} listings seeded)",
            subscriber_id,
            url,
            subscription.seen_urls.len()
        );
        previous
    }

    /// Stops tracking and clears the seen-set. Returns the URL that was
    /// tracked, if any.
    pub fn stop_tracking(&self, subscriber_id: SubscriberId) -> Option<String> {
        let mut entries = self.entries();
        let subscription = entries.get_mut(&subscriber_id)?;

        let previous = subscription.tracked_url.take();
        subscription.seen_urls.clear();
        if previous.is_some() {
            subscription.epoch += 1;
            info!("Subscriber {} stopped tracking", subscriber_id);
        }
        previous
    }

    /// Subscriptions with a tracked URL, ordered by subscriber id.
    pub fn active_subscriptions(&self) -> Vec<ActiveSubscription> {
        let mut active: Vec<_> = self
            .entries()
            .values()
            .filter_map(|subscription| {
                subscription
                    .tracked_url
                    .as_ref()
                    .map(|tracked_url| ActiveSubscription {
                        subscriber_id: subscription.subscriber_id,
                        tracked_url: tracked_url.clone(),
                        seen_urls: subscription.seen_urls.clone(),
                        epoch: subscription.epoch,
                    })
            })
            .collect();
        active.sort_by_key(|subscription| subscription.subscriber_id.0);
        active
    }

    /// Whether the subscriber is still tracking under `epoch`.
    pub fn is_current(&self, subscriber_id: SubscriberId, epoch: u64) -> bool {
        self.entries()
            .get(&subscriber_id)
            .map(|subscription| subscription.is_tracking() && subscription.epoch == epoch)
            .unwrap_or(false)
    }

    /// Replaces the seen-set with `urls` if the subscription is still at
    /// `epoch`. Returns false when the write was discarded as stale.
    pub fn update_seen(
        &self,
        subscriber_id: SubscriberId,
        epoch: u64,
        urls: HashSet<String>,
    ) -> bool {
        let mut entries = self.entries();
        match entries.get_mut(&subscriber_id) {
            Some(subscription) if subscription.is_tracking() && subscription.epoch == epoch => {
                subscription.seen_urls = urls;
                true
            }
            _ => {
                debug!(
                    "Discarding stale seen-set update for subscriber {} (epoch {})",
                    subscriber_id, epoch
                );
                false
            }
        }
    }
}
