use std::{sync::Arc, time::Duration};

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use telemetry_service::{
    aggregation::AggregationEngine,
    broadcast::ChannelHub,
    config::AppConfig,
    observability,
    scheduler::Scheduler,
    server::{self, AppState},
    store::PgStore,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;
    let settings = cfg.scheduler.settings()?;

    // Lazy pool: the scheduler keeps retrying while the database is down.
    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .acquire_timeout(Duration::from_secs(cfg.database.acquire_timeout_secs))
        .connect_lazy(&cfg.database.uri)?;
    let store = Arc::new(PgStore::new(pool));
    let hub = Arc::new(ChannelHub::new(cfg.broadcast.channel_capacity));

    if let Some(http) = &cfg.http {
        if http.metrics {
            server::install_metrics_recorder()?;
        }
        let state = AppState {
            hub: Arc::clone(&hub),
            aggregation: AggregationEngine::new(Arc::clone(&store), settings.max_concurrency),
            sites: Arc::new(cfg.sites.clone()),
            utc_offset: settings.utc_offset,
            default_group: settings.channel_group.clone(),
        };
        server::spawn(&http.bind_addr, server::router(state))?;
    }

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                return;
            }
            tracing::info!("shutdown requested");
            shutdown.cancel();
        }
    });

    let scheduler = Scheduler::new(store, hub, cfg.sites, settings);
    scheduler.run(shutdown).await;

    Ok(())
}
