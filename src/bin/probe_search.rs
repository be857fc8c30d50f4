use anyhow::{bail, Context, Result};
use std::sync::Arc;

use listing_monitor::config::Config;
use listing_monitor::fetch::HttpFetcher;
use listing_monitor::parsers::AvitoExtractor;
use listing_monitor::tracker::SnapshotFetcher;
use listing_monitor::utils::http::create_client;

/// Fetches one search URL and prints what the extractor sees on it.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("listing_monitor=debug".parse()?),
        )
        .init();

    let Some(url) = std::env::args().nth(1) else {
        bail!("usage: probe_search <search-url>");
    };

    let config = Config::load()?;
    let client = create_client(&config.user_agent, config.fetch_timeout())?;
    let snapshots = SnapshotFetcher::new(
        Arc::new(HttpFetcher::new(client)),
        Arc::new(AvitoExtractor::new()),
        config.retry_policy(),
    );

    let snapshot = snapshots
        .fetch_snapshot(&url)
        .await
        .with_context(|| format!("Failed to load {}", url))?;

    println!("Total listings reported: {}", snapshot.total_count);
    println!("Listings on page: {}", snapshot.listings.len());
    for listing in &snapshot.listings {
        println!("\n{}", listing.title);
        println!("  {} | {}", listing.price, listing.posted_at);
        println!("  {}", listing.url);
        if let Some(image_url) = &listing.image_url {
            println!("  image: {}", image_url);
        }
    }

    Ok(())
}
