use html_escape::encode_text;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::models::{Listing, SubscriberId, EMOJI_DATE, EMOJI_PIN, EMOJI_PRICE};
use crate::notify::Notifier;

/// How a listing notification ended up being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Rich,
    Plain,
    Failed,
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        !matches!(self, Delivery::Failed)
    }
}

/// Turns new listings into notification calls.
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Delivers one listing. Tries the image message first when the listing
    /// has an image, then a plain message with the same text. Failures are
    /// logged and reported through the returned [`Delivery`].
    pub async fn deliver(&self, subscriber: SubscriberId, listing: &Listing) -> Delivery {
        let text = format_listing_message(listing);

        if let Some(image_url) = listing.image_url.as_deref() {
            match self
                .notifier
                .send_rich(subscriber, &text, image_url, &listing.url)
                .await
            {
                Ok(()) => {
                    info!("Sent listing {} to {}", listing.url, subscriber);
                    return Delivery::Rich;
                }
                Err(e) => warn!(
                    "Image message for {} to {} failed, falling back to text: {}",
                    listing.url, subscriber, e
                ),
            }
        }

        match self
            .notifier
            .send_plain(subscriber, &text, &listing.url)
            .await
        {
            Ok(()) => {
                info!("Sent listing {} to {} as text", listing.url, subscriber);
                Delivery::Plain
            }
            Err(e) => {
                error!("Failed to send listing {} to {}: {}", listing.url, subscriber, e);
                Delivery::Failed
            }
        }
    }
}

/// Message text for a listing, formatted for HTML parse mode.
pub fn format_listing_message(listing: &Listing) -> String {
    format!(
        "{} <b>{}</b>\n\n{} <i>{}</i>\n{} {}",
        EMOJI_PIN,
        encode_text(&listing.title),
        EMOJI_DATE,
        encode_text(&listing.posted_at),
        EMOJI_PRICE,
        encode_text(&listing.price),
    )
}
