use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use translate_cache::{
    cache,
    config::Config,
    engines::EngineRegistry,
    invoker::CommandInvoker,
    janitor::CacheJanitor,
    notifier::{Notifier, STARTUP_MESSAGE},
    resolver::Resolver,
    scheduler, server, telegram,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translate_cache=info".parse()?),
        )
        .init();

    info!("Starting translation cache");

    let config = Config::from_env()?;
    let store = cache::open_store(&config.redis_url).context("Invalid REDIS_URL")?;

    // Notifications: events queue up while the bot connects in the background
    let (notifier, notify) = Notifier::new(config.notification_interval);
    let sink_config = config.clone();
    tokio::spawn(async move {
        let sink = telegram::connect_sink(&sink_config).await;
        notifier.with_sink(sink).run().await;
    });
    notify.notify(STARTUP_MESSAGE);

    // Startup sweep of bad cache entries
    let janitor = Arc::new(CacheJanitor::new(store.clone(), notify.clone()));
    tokio::spawn({
        let janitor = Arc::clone(&janitor);
        async move {
            janitor.sweep().await;
        }
    });

    // Engine discovery; requests use the preferred engine alone until it finishes
    let engines = Arc::new(EngineRegistry::new(config.preferred_engine.clone()));
    tokio::spawn({
        let engines = Arc::clone(&engines);
        let command = config.command.clone();
        let notify = notify.clone();
        async move {
            engines.refresh(&command, &notify).await;
        }
    });

    let _scheduler = match &config.cleanup_schedule {
        Some(cron_expr) => Some(scheduler::start_cleanup_schedule(janitor, cron_expr).await?),
        None => None,
    };

    let invoker = Arc::new(
        CommandInvoker::new(config.command.clone()).with_timeout(config.engine_timeout),
    );
    let resolver = Arc::new(Resolver::new(store, invoker, engines, notify));
    let app = server::router(server::AppState { resolver });

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind {}", addr))?;
    info!("✓ Listening on {}", addr);

    axum::serve(listener, app).await.context("HTTP server error")?;

    Ok(())
}
