//! One-off cache sweep, the same one the server runs at startup
//!
//! Usage:
//!   cargo run --bin sweep
//!
//! Reads REDIS_URL and the Telegram settings (TG_TOKEN, TG_CHAT_ID) from the
//! environment. The removal summary is delivered before the process exits.

use anyhow::{Context, Result};
use tracing::info;
use translate_cache::{cache, config::Config, janitor::CacheJanitor, notifier::Notifier, telegram};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translate_cache=info".parse()?)
                .add_directive("sweep=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    let store = cache::open_store(&config.redis_url).context("Invalid REDIS_URL")?;

    let sink = telegram::connect_sink(&config).await;
    let (notifier, notify) = Notifier::new(config.notification_interval);
    let delivery = notifier.with_sink(sink).spawn();

    // The janitor holds the only handle; dropping it lets the notifier flush and stop
    let report = CacheJanitor::new(store, notify).sweep().await;
    delivery.await.context("Notifier task failed")?;

    info!(
        "✓ Removed {} empty and {} non-printable translations",
        report.empty.removed, report.non_printable.removed
    );

    Ok(())
}
