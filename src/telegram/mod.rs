pub mod bot;
pub mod types;

pub use bot::{Bot, Command};

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

use crate::models::SubscriberId;
use crate::notify::{Notifier, NotifyError};
use types::{ApiResponse, Update};

const OPEN_LISTING_BUTTON: &str = "Open listing";

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Telegram request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telegram API error {code}: {description}")]
    Api { code: u16, description: String },
}

impl From<TelegramError> for NotifyError {
    fn from(error: TelegramError) -> Self {
        match error {
            TelegramError::Http(e) => NotifyError::Transport(e.to_string()),
            TelegramError::Api { code, description } => NotifyError::Rejected {
                status: code,
                description,
            },
        }
    }
}

/// Minimal Telegram Bot API client.
pub struct TelegramClient {
    http: Client,
    endpoint: String,
}

impl TelegramClient {
    pub fn new(http: Client, api_url: &str, token: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &Value,
        timeout: Option<Duration>,
    ) -> Result<T, TelegramError> {
        let mut request = self
            .http
            .post(format!("{}/{}", self.endpoint, method))
            .json(payload);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let body: ApiResponse<T> = response.json().await?;

        match body.result {
            Some(result) if body.ok => Ok(result),
            _ => {
                let code = body.error_code.unwrap_or(status.as_u16());
                let description = body
                    .description
                    .unwrap_or_else(|| "Unknown error".to_string());
                error!("Telegram {} failed with {}: {}", method, code, description);
                Err(TelegramError::Api { code, description })
            }
        }
    }

    /// Sends a plain chat reply without formatting.
    pub async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let payload = json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        self.call::<Value>("sendMessage", &payload, None).await?;
        Ok(())
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        poll_timeout: Duration,
    ) -> Result<Vec<Update>, TelegramError> {
        let payload = json!({
            "offset": offset,
            "timeout": poll_timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        let updates: Vec<Update> = self
            .call("getUpdates", &payload, Some(poll_timeout + Duration::from_secs(10)))
            .await?;
        debug!("Received {} updates", updates.len());
        Ok(updates)
    }
}

fn open_listing_keyboard(action_url: &str) -> Value {
    json!({
        "inline_keyboard": [[
            { "text": OPEN_LISTING_BUTTON, "url": action_url }
        ]]
    })
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send_rich(
        &self,
        subscriber: SubscriberId,
        text: &str,
        image_url: &str,
        action_url: &str,
    ) -> Result<(), NotifyError> {
        let payload = json!({
            "chat_id": subscriber.0,
            "photo": image_url,
            "caption": text,
            "parse_mode": "HTML",
            "reply_markup": open_listing_keyboard(action_url),
        });
        self.call::<Value>("sendPhoto", &payload, None).await?;
        Ok(())
    }

    async fn send_plain(
        &self,
        subscriber: SubscriberId,
        text: &str,
        action_url: &str,
    ) -> Result<(), NotifyError> {
        let payload = json!({
            "chat_id": subscriber.0,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
            "reply_markup": open_listing_keyboard(action_url),
        });
        self.call::<Value>("sendMessage", &payload, None).await?;
        Ok(())
    }
}
