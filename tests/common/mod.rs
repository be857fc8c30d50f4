#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use listing_monitor::fetch::{FetchError, Page, PageFetcher};
use listing_monitor::models::{Listing, Snapshot, SubscriberId, TotalCount};
use listing_monitor::notify::{Dispatcher, Notifier, NotifyError};
use listing_monitor::parsers::{Extraction, ListingExtractor};
use listing_monitor::storage::SubscriptionStore;
use listing_monitor::tracker::{
    RetryPolicy, Scheduler, SchedulerSettings, SnapshotFetcher, TrackingService,
};

/// Page body understood by [`CsvExtractor`] as an explicit "no results" page.
pub const EMPTY_SEARCH: &str = "EMPTY";

/// Fetcher that replays scripted responses per URL.
///
/// Page bodies are comma separated listing urls, see [`CsvExtractor`].
/// Once a URL's queue is empty its standing page is served, if any.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<HashMap<String, VecDeque<Result<Page, FetchError>>>>,
    standing: Mutex<HashMap<String, Page>>,
    latency: Mutex<HashMap<String, Duration>>,
    requests: Mutex<Vec<(String, Instant)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn push(&self, url: &str, response: Result<Page, FetchError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn push_listings(&self, url: &str, listing_urls: &[&str]) {
        self.push(url, Ok(Page::new(url, listing_urls.join(","))));
    }

    pub fn push_timeout(&self, url: &str) {
        self.push(url, Err(FetchError::Timeout(url.to_string())));
    }

    /// Serves `listing_urls` for every request that has nothing queued.
    pub fn serve_listings(&self, url: &str, listing_urls: &[&str]) {
        self.standing
            .lock()
            .unwrap()
            .insert(url.to_string(), Page::new(url, listing_urls.join(",")));
    }

    /// Makes every fetch of `url` take `delay`.
    pub fn set_latency(&self, url: &str, delay: Duration) {
        self.latency.lock().unwrap().insert(url.to_string(), delay);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn request_times(&self, url: &str) -> Vec<Instant> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(requested, _)| requested == url)
            .map(|(_, at)| *at)
            .collect()
    }

    /// Highest number of fetches that were running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.as_str() == url).count()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        let delay = self.latency.lock().unwrap().get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let queued = self
            .responses
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|queue| queue.pop_front());
        queued
            .or_else(|| self.standing.lock().unwrap().get(url).cloned().map(Ok))
            .unwrap_or_else(|| {
                Err(FetchError::Network {
                    url: url.to_string(),
                    reason: "no scripted response".to_string(),
                })
            })
    }
}

/// Reads a page body of comma separated listing urls.
pub struct CsvExtractor;

impl ListingExtractor for CsvExtractor {
    fn extract(&self, html: &str) -> Extraction {
        if html == EMPTY_SEARCH {
            return Extraction::EmptySearch;
        }
        let listings: Vec<Listing> = html
            .split(',')
            .filter(|url| !url.is_empty())
            .map(|url| Listing::new(format!("Listing {}", url), url).with_price("100 ₽"))
            .collect();
        let total = TotalCount::Known(listings.len().to_string());
        Extraction::Listings(Snapshot::new(listings, total))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub subscriber: SubscriberId,
    pub action_url: String,
    pub rich: bool,
}

/// Notifier that records every successful send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub fail_rich: bool,
    pub fail_plain: bool,
    /// Sending to this subscriber panics.
    pub panic_for: Option<SubscriberId>,
    sent: Mutex<Vec<Sent>>,
    attempts: Mutex<usize>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail_rich: true,
            fail_plain: true,
            ..Default::default()
        }
    }

    pub fn panicking_for(subscriber: SubscriberId) -> Self {
        Self {
            panic_for: Some(subscriber),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_urls(&self, subscriber: SubscriberId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|s| s.subscriber == subscriber)
            .map(|s| s.action_url)
            .collect()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    fn record(&self, subscriber: SubscriberId, action_url: &str, rich: bool, fail: bool) -> Result<(), NotifyError> {
        *self.attempts.lock().unwrap() += 1;
        if self.panic_for == Some(subscriber) {
            panic!("notifier crashed for subscriber {}", subscriber);
        }
        if fail {
            return Err(NotifyError::Transport("channel unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(Sent {
            subscriber,
            action_url: action_url.to_string(),
            rich,
        });
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_rich(
        &self,
        subscriber: SubscriberId,
        _text: &str,
        _image_url: &str,
        action_url: &str,
    ) -> Result<(), NotifyError> {
        self.record(subscriber, action_url, true, self.fail_rich)
    }

    async fn send_plain(
        &self,
        subscriber: SubscriberId,
        _text: &str,
        action_url: &str,
    ) -> Result<(), NotifyError> {
        self.record(subscriber, action_url, false, self.fail_plain)
    }
}

pub struct Harness {
    pub store: Arc<SubscriptionStore>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub notifier: Arc<RecordingNotifier>,
    pub snapshots: Arc<SnapshotFetcher>,
    pub tracking: Arc<TrackingService>,
    pub scheduler: Scheduler,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_notifier(RecordingNotifier::default())
    }

    pub fn with_notifier(notifier: RecordingNotifier) -> Self {
        Self::with_settings(notifier, SchedulerSettings::default())
    }

    pub fn with_settings(notifier: RecordingNotifier, settings: SchedulerSettings) -> Self {
        let store = Arc::new(SubscriptionStore::new());
        let fetcher = Arc::new(ScriptedFetcher::default());
        let notifier = Arc::new(notifier);
        let snapshots = Arc::new(SnapshotFetcher::new(
            fetcher.clone(),
            Arc::new(CsvExtractor),
            RetryPolicy::default(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(notifier.clone()));
        let tracking = Arc::new(TrackingService::new(store.clone(), snapshots.clone()));
        let scheduler = Scheduler::new(
            store.clone(),
            snapshots.clone(),
            dispatcher,
            settings,
        );

        Self {
            store,
            fetcher,
            notifier,
            snapshots,
            tracking,
            scheduler,
        }
    }
}

pub fn seen(urls: &[&str]) -> std::collections::HashSet<String> {
    urls.iter().map(|u| u.to_string()).collect()
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}
