use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use listing_monitor::config::Config;
use listing_monitor::fetch::HttpFetcher;
use listing_monitor::notify::Dispatcher;
use listing_monitor::parsers::AvitoExtractor;
use listing_monitor::storage::SubscriptionStore;
use listing_monitor::telegram::{Bot, TelegramClient};
use listing_monitor::tracker::{Scheduler, SnapshotFetcher, TrackingService};
use listing_monitor::utils::http::create_client;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("listing_monitor=info".parse()?),
        )
        .init();

    info!("Starting Listing Monitor");

    let config = Config::load()?;
    let bot_token = config
        .telegram_bot_token
        .clone()
        .context("LISTING_MONITOR_TELEGRAM_BOT_TOKEN must be set")?;

    // Separate pools for the search site and the Telegram API
    let fetch_client = create_client(&config.user_agent, config.fetch_timeout())?;
    let telegram_http = create_client(&config.user_agent, config.fetch_timeout())?;

    let telegram = Arc::new(TelegramClient::new(
        telegram_http,
        &config.telegram_api_url,
        &bot_token,
    ));
    let store = Arc::new(SubscriptionStore::new());
    let snapshots = Arc::new(SnapshotFetcher::new(
        Arc::new(HttpFetcher::new(fetch_client)),
        Arc::new(AvitoExtractor::new()),
        config.retry_policy(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(telegram.clone()));
    let tracking = Arc::new(TrackingService::new(store.clone(), snapshots.clone()));

    let scheduler = Scheduler::new(store, snapshots, dispatcher, config.scheduler_settings());
    let bot = Bot::new(
        telegram,
        tracking,
        config.allowed_host.clone(),
        config.telegram_poll_timeout(),
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested, finishing in-flight checks");
                signal.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    tokio::join!(scheduler.run(shutdown.clone()), bot.run(shutdown.clone()));

    info!("Listing Monitor stopped");
    Ok(())
}
