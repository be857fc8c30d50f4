use anyhow::{bail, Context, Result};
use config::{Environment, File, FileFormat};
use serde::Deserialize;
use std::time::Duration;

use crate::tracker::{RetryPolicy, SchedulerSettings};
use crate::utils::http::DEFAULT_USER_AGENT;

const ENV_PREFIX: &str = "LISTING_MONITOR";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub check_interval_min_secs: u64,
    pub check_interval_max_secs: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub delivery_delay_ms: u64,
    pub error_cooldown_secs: u64,
    pub max_concurrent_fetches: usize,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    pub allowed_host: String,
    #[serde(default)]
    pub telegram_bot_token: Option<String>,
    pub telegram_api_url: String,
    pub telegram_poll_timeout_secs: u64,
}

impl Config {
    /// Loads configuration from `LISTING_MONITOR_*` environment variables
    /// (and a `.env` file if present) on top of the defaults.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let settings = Self::builder()?
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        Self::finish(settings)
    }

    /// Parses configuration from a TOML document on top of the defaults.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = Self::builder()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .context("Failed to read configuration")?;

        Self::finish(settings)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(config::Config::builder()
            .set_default("check_interval_min_secs", 60_i64)?
            .set_default("check_interval_max_secs", 90_i64)?
            .set_default("max_retries", 3_i64)?
            .set_default("retry_delay_secs", 10_i64)?
            .set_default("delivery_delay_ms", 1000_i64)?
            .set_default("error_cooldown_secs", 30_i64)?
            .set_default("max_concurrent_fetches", 4_i64)?
            .set_default("fetch_timeout_secs", 25_i64)?
            .set_default("user_agent", DEFAULT_USER_AGENT)?
            .set_default("allowed_host", "avito.ru")?
            .set_default("telegram_api_url", "https://api.telegram.org")?
            .set_default("telegram_poll_timeout_secs", 30_i64)?)
    }

    fn finish(settings: config::Config) -> Result<Self> {
        let config: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.check_interval_min_secs > self.check_interval_max_secs {
            bail!(
                "check interval minimum ({}s) exceeds maximum ({}s)",
                self.check_interval_min_secs,
                self.check_interval_max_secs
            );
        }
        if self.max_retries == 0 {
            bail!("max_retries must be at least 1");
        }
        if self.max_concurrent_fetches == 0 {
            bail!("max_concurrent_fetches must be at least 1");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
        }
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            check_interval_min: Duration::from_secs(self.check_interval_min_secs),
            check_interval_max: Duration::from_secs(self.check_interval_max_secs),
            delivery_delay: Duration::from_millis(self.delivery_delay_ms),
            error_cooldown: Duration::from_secs(self.error_cooldown_secs),
            max_concurrent_fetches: self.max_concurrent_fetches,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn telegram_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.telegram_poll_timeout_secs)
    }
}
