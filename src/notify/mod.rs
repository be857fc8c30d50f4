use async_trait::async_trait;
use thiserror::Error;

use crate::models::SubscriberId;

mod dispatcher;
pub use dispatcher::{format_listing_message, Delivery, Dispatcher};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Transport(String),
    #[error("notification rejected ({status}): {description}")]
    Rejected { status: u16, description: String },
}

/// A channel able to deliver a formatted message to a subscriber.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `text` together with an image.
    async fn send_rich(
        &self,
        subscriber: SubscriberId,
        text: &str,
        image_url: &str,
        action_url: &str,
    ) -> Result<(), NotifyError>;

    /// Sends `text` on its own.
    async fn send_plain(
        &self,
        subscriber: SubscriberId,
        text: &str,
        action_url: &str,
    ) -> Result<(), NotifyError>;
}
