use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::{FetchError, Page, PageFetcher};

/// Fetches search pages with a shared pooled reqwest client.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_transport_error(url, e))?;

        let status = response.status();
        let final_url = response.url().to_string();

        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            warn!("HTTP {} from {}, treating as blocked", status, url);
            return Err(FetchError::Blocked {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        if !status.is_success() {
            warn!("HTTP error {}: {}", status, url);
            return Err(FetchError::Network {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| classify_transport_error(url, e))?;

        debug!("Fetched {} bytes from {}", html.len(), final_url);
        Ok(Page { final_url, html })
    }
}

fn classify_transport_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(url.to_string())
    } else {
        FetchError::Network {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}
