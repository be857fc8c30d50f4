use std::collections::HashSet;
use std::fmt;

// NewType pattern for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub i64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tracking state of one subscriber.
///
/// `epoch` increases every time tracking starts or stops, so a reader that
/// captured an older epoch can tell its view is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub subscriber_id: SubscriberId,
    pub tracked_url: Option<String>,
    pub seen_urls: HashSet<String>,
    pub epoch: u64,
}

impl Subscription {
    pub fn new(subscriber_id: SubscriberId) -> Self {
        Self {
            subscriber_id,
            tracked_url: None,
            seen_urls: HashSet::new(),
            epoch: 0,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.tracked_url.is_some()
    }
}

/// A subscription with a tracked URL, as captured at the start of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSubscription {
    pub subscriber_id: SubscriberId,
    pub tracked_url: String,
    pub seen_urls: HashSet<String>,
    pub epoch: u64,
}
