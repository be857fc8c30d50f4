use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::models::{
    SubscriberId, EMOJI_CHECK, EMOJI_CROSS, EMOJI_HOURGLASS, EMOJI_LINK, EMOJI_STATS,
    EMOJI_WARNING,
};
use crate::telegram::types::Update;
use crate::telegram::TelegramClient;
use crate::tracker::{StartOutcome, StopOutcome, TrackingService};
use crate::utils::url::host_matches;

const ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Track(String),
    Replace,
    Keep,
    Unknown,
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.starts_with("http") {
            return Command::Track(text.to_string());
        }

        // Commands may be addressed as /stop@SomeBot in group chats
        let command = text
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .split('@')
            .next()
            .unwrap_or_default();

        match command {
            "/start" | "/help" => Command::Start,
            "/stop" => Command::Stop,
            "/replace" => Command::Replace,
            "/keep" => Command::Keep,
            _ => Command::Unknown,
        }
    }
}

/// Chat front end: turns incoming messages into tracking requests.
///
/// A tracking request for a subscriber who already tracks a search is parked
/// until the subscriber answers with `/replace` or `/keep`.
pub struct Bot {
    client: Arc<TelegramClient>,
    tracking: Arc<TrackingService>,
    allowed_host: String,
    poll_timeout: Duration,
    pending: Mutex<HashMap<SubscriberId, String>>,
}

impl Bot {
    pub fn new(
        client: Arc<TelegramClient>,
        tracking: Arc<TrackingService>,
        allowed_host: impl Into<String>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            client,
            tracking,
            allowed_host: allowed_host.into(),
            poll_timeout,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Long-polls for updates until `shutdown` is cancelled.
    ///
    /// Updates are handled concurrently with polling, so a slow tracking
    /// request in one chat does not hold back commands from other chats.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Bot polling started");
        let mut offset = 0;
        let mut in_flight = FuturesUnordered::new();

        loop {
            let poll = self.client.get_updates(offset, self.poll_timeout);
            let Some(updates) = drive(poll, &mut in_flight, &shutdown).await else {
                break;
            };

            match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        in_flight.push(self.process_update(update));
                    }
                }
                Err(e) => {
                    error!("Failed to fetch updates: {}", e);
                    let backoff = tokio::time::sleep(ERROR_BACKOFF);
                    if drive(backoff, &mut in_flight, &shutdown).await.is_none() {
                        break;
                    }
                }
            }
        }

        if !in_flight.is_empty() {
            info!("Dropping {} commands still in progress", in_flight.len());
        }
        info!("Bot polling stopped");
    }

    async fn process_update(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let Some(text) = message.text else {
            return;
        };
        let subscriber = SubscriberId(message.chat.id);
        let command = Command::parse(&text);

        if matches!(command, Command::Track(_) | Command::Replace) {
            self.reply(subscriber, &format!("{} Got the link, processing...", EMOJI_HOURGLASS))
                .await;
        }

        let reply = self.handle(subscriber, command).await;
        self.reply(subscriber, &reply).await;
    }

    async fn reply(&self, subscriber: SubscriberId, text: &str) {
        if let Err(e) = self.client.send_text(subscriber.0, text).await {
            warn!("Failed to reply to {}: {}", subscriber, e);
        }
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriberId, String>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Executes a command and returns the reply text.
    pub async fn handle(&self, subscriber: SubscriberId, command: Command) -> String {
        match command {
            Command::Start => {
                self.tracking.register(subscriber);
                "Hi! I track new listings on Avito.\n\
                 Send me a link to an Avito search to start tracking it.\n\
                 Use /stop to stop tracking."
                    .to_string()
            }
            Command::Stop => {
                self.pending().remove(&subscriber);
                match self.tracking.stop_tracking(subscriber) {
                    StopOutcome::Stopped(url) => format!(
                        "{} Tracking stopped!\n{} Link: {}",
                        EMOJI_CHECK, EMOJI_LINK, url
                    ),
                    StopOutcome::NotTracking => {
                        format!("{} You have no active tracking.", EMOJI_CROSS)
                    }
                }
            }
            Command::Track(url) => {
                if !host_matches(&url, &self.allowed_host) {
                    return format!(
                        "{} Please send a link to a search on {}.",
                        EMOJI_CROSS, self.allowed_host
                    );
                }
                self.tracking.register(subscriber);
                match self.tracking.start_tracking(subscriber, &url, false).await {
                    StartOutcome::AlreadyTracking(existing) => {
                        self.pending().insert(subscriber, url);
                        format!(
                            "{} You are already tracking {}.\n\
                             Send /replace to track the new link instead, or /keep to keep the current one.",
                            EMOJI_WARNING, existing
                        )
                    }
                    outcome => start_reply(outcome),
                }
            }
            Command::Replace => {
                let Some(url) = self.pending().remove(&subscriber) else {
                    return format!("{} There is no link waiting to replace the current one.", EMOJI_CROSS);
                };
                start_reply(self.tracking.start_tracking(subscriber, &url, true).await)
            }
            Command::Keep => {
                self.pending().remove(&subscriber);
                match self.tracking.tracked_url(subscriber) {
                    Some(current) => format!("{} Keeping {}", EMOJI_CHECK, current),
                    None => format!("{} You have no active tracking.", EMOJI_CROSS),
                }
            }
            Command::Unknown => format!(
                "Send me a link to a search on {} to start tracking, or /stop to stop.",
                self.allowed_host
            ),
        }
    }
}

/// Waits for `fut` while driving the command handlers already in flight.
/// Returns `None` once `shutdown` is cancelled.
async fn drive<T, H>(
    fut: impl Future<Output = T>,
    in_flight: &mut FuturesUnordered<H>,
    shutdown: &CancellationToken,
) -> Option<T>
where
    H: Future<Output = ()>,
{
    tokio::pin!(fut);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return None,
            Some(()) = in_flight.next() => {}
            output = &mut fut => return Some(output),
        }
    }
}

fn start_reply(outcome: StartOutcome) -> String {
    match outcome {
        StartOutcome::Accepted { total_count, .. } => format!(
            "{} Started tracking new listings!\n{} Listings in this search: {}",
            EMOJI_CHECK, EMOJI_STATS, total_count
        ),
        StartOutcome::AlreadyTracking(existing) => format!(
            "{} You are already tracking {}.",
            EMOJI_WARNING, existing
        ),
        StartOutcome::NoListingsFound => format!(
            "{} Could not find listings at this link.\n\
             Please check the link and try again later.",
            EMOJI_CROSS
        ),
    }
}
