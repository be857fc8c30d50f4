use chrono::Local;
use futures::future;
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use rand::Rng;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::models::ActiveSubscription;
use crate::notify::Dispatcher;
use crate::storage::SubscriptionStore;
use crate::tracker::diff::new_listings;
use crate::tracker::snapshot::SnapshotFetcher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub check_interval_min: Duration,
    pub check_interval_max: Duration,
    pub delivery_delay: Duration,
    pub error_cooldown: Duration,
    pub max_concurrent_fetches: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            check_interval_min: Duration::from_secs(60),
            check_interval_max: Duration::from_secs(90),
            delivery_delay: Duration::from_secs(1),
            error_cooldown: Duration::from_secs(30),
            max_concurrent_fetches: 4,
        }
    }
}

/// Result of checking one subscription during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionOutcome {
    /// No snapshot could be obtained; stored state was left alone.
    Skipped,
    /// The check panicked; stored state was left alone.
    Aborted,
    Checked {
        new_listings: usize,
        delivered: usize,
        failed: usize,
        /// False when tracking was started or stopped while the check ran
        /// and the seen-set update was discarded.
        state_updated: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub subscriptions: usize,
    pub skipped: usize,
    pub new_listings: usize,
    pub delivered: usize,
    pub failed: usize,
    pub discarded: usize,
    pub aborted: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: SubscriptionOutcome) {
        self.subscriptions += 1;
        match outcome {
            SubscriptionOutcome::Skipped => self.skipped += 1,
            SubscriptionOutcome::Aborted => self.aborted += 1,
            SubscriptionOutcome::Checked {
                new_listings,
                delivered,
                failed,
                state_updated,
            } => {
                self.new_listings += new_listings;
                self.delivered += delivered;
                self.failed += failed;
                if !state_updated {
                    self.discarded += 1;
                }
            }
        }
    }
}

/// Periodically re-fetches every tracked search and notifies subscribers
/// about listings that were not on the page last time.
pub struct Scheduler {
    store: Arc<SubscriptionStore>,
    snapshots: Arc<SnapshotFetcher>,
    dispatcher: Arc<Dispatcher>,
    settings: SchedulerSettings,
}

impl Scheduler {
    pub fn new(
        store: Arc<SubscriptionStore>,
        snapshots: Arc<SnapshotFetcher>,
        dispatcher: Arc<Dispatcher>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            store,
            snapshots,
            dispatcher,
            settings,
        }
    }

    /// Runs cycles until `shutdown` is cancelled.
    ///
    /// A cycle in which any check panicked is followed by the error cooldown
    /// instead of the regular interval.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Scheduler started");

        while !shutdown.is_cancelled() {
            info!(
                "--- Starting new check cycle at {} ---",
                Local::now().format("%Y-%m-%d %H:%M:%S")
            );

            let cycle = AssertUnwindSafe(self.run_cycle(&shutdown)).catch_unwind();

            let pause = match cycle.await {
                Ok(report) if report.aborted > 0 => {
                    error!(
                        "Check cycle had {} aborted subscriptions. Cooling down for {} seconds",
                        report.aborted,
                        self.settings.error_cooldown.as_secs()
                    );
                    self.settings.error_cooldown
                }
                Ok(report) => {
                    let pause = self.next_interval();
                    info!(
                        "Check cycle completed: {} subscriptions, {} skipped, {} new, {} delivered, {} failed. Waiting {} seconds",
                        report.subscriptions,
                        report.skipped,
                        report.new_listings,
                        report.delivered,
                        report.failed,
                        pause.as_secs()
                    );
                    pause
                }
                Err(panic) => {
                    error!(
                        "Check cycle aborted: {}. Cooling down for {} seconds",
                        panic_message(panic.as_ref()),
                        self.settings.error_cooldown.as_secs()
                    );
                    self.settings.error_cooldown
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(pause) => {}
            }
        }

        info!("Scheduler stopped");
    }

    /// Checks every active subscription once. Once `shutdown` is cancelled no
    /// further subscription is started, while those already in flight finish.
    pub async fn run_cycle(&self, shutdown: &CancellationToken) -> CycleReport {
        let active = self.store.active_subscriptions();
        let mut report = CycleReport::default();

        if active.is_empty() {
            debug!("No active subscriptions");
            return report;
        }

        info!("Checking {} active subscriptions", active.len());

        let outcomes: Vec<SubscriptionOutcome> = stream::iter(active)
            .take_while(|_| future::ready(!shutdown.is_cancelled()))
            .map(|subscription| self.guarded_check(subscription))
            .buffer_unordered(self.settings.max_concurrent_fetches.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    /// Runs one check, containing a panic to that subscription so siblings in
    /// the same batch still deliver and record their state.
    async fn guarded_check(&self, subscription: ActiveSubscription) -> SubscriptionOutcome {
        let subscriber_id = subscription.subscriber_id;
        match AssertUnwindSafe(self.process_subscription(subscription))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => {
                error!(
                    "Check for subscriber {} panicked: {}",
                    subscriber_id,
                    panic_message(panic.as_ref())
                );
                SubscriptionOutcome::Aborted
            }
        }
    }

    /// Fetches, diffs, notifies and updates one subscription.
    pub async fn process_subscription(&self, subscription: ActiveSubscription) -> SubscriptionOutcome {
        let ActiveSubscription {
            subscriber_id,
            tracked_url,
            seen_urls,
            epoch,
        } = subscription;

        let snapshot = match self.snapshots.fetch_snapshot(&tracked_url).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Skipping subscriber {} this cycle: {}", subscriber_id, e);
                return SubscriptionOutcome::Skipped;
            }
        };

        let fresh = new_listings(&snapshot, &seen_urls);
        let mut delivered = 0;
        let mut failed = 0;

        for (index, listing) in fresh.iter().enumerate() {
            if index > 0 {
                sleep(self.settings.delivery_delay).await;
            }
            if !self.store.is_current(subscriber_id, epoch) {
                info!(
                    "Subscriber {} changed tracking during the check, dropping {} pending notifications",
                    subscriber_id,
                    fresh.len() - index
                );
                break;
            }
            if self.dispatcher.deliver(subscriber_id, listing).await.is_delivered() {
                delivered += 1;
            } else {
                failed += 1;
            }
        }

        if fresh.is_empty() {
            info!("No new listings for subscriber {}", subscriber_id);
        } else {
            info!("Found {} new listings for subscriber {}", fresh.len(), subscriber_id);
        }

        let state_updated = self
            .store
            .update_seen(subscriber_id, epoch, snapshot.urls());

        SubscriptionOutcome::Checked {
            new_listings: fresh.len(),
            delivered,
            failed,
            state_updated,
        }
    }

    fn next_interval(&self) -> Duration {
        let min = self.settings.check_interval_min;
        let max = self.settings.check_interval_max;
        if max <= min {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_readable() {
        let from_str: Box<dyn Any + Send> = Box::new("boom");
        let from_string: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(from_str.as_ref()), "boom");
        assert_eq!(panic_message(from_string.as_ref()), "bang");
    }

    #[test]
    fn report_counts_discarded_updates() {
        let mut report = CycleReport::default();
        report.record(SubscriptionOutcome::Skipped);
        report.record(SubscriptionOutcome::Aborted);
        report.record(SubscriptionOutcome::Checked {
            new_listings: 2,
            delivered: 1,
            failed: 1,
            state_updated: false,
        });

        assert_eq!(
            report,
            CycleReport {
                subscriptions: 3,
                skipped: 1,
                new_listings: 2,
                delivered: 1,
                failed: 1,
                discarded: 1,
                aborted: 1,
            }
        );
    }
}
