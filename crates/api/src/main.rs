use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use persistence::PgWebhookStore;
use webhook_engine_api::app::{create_app, AppState};
use webhook_engine_api::config::Config;
use webhook_engine_api::jobs::{JobScheduler, PoolMetricsJob, WebhookCleanupJob, WebhookRetryJob};
use webhook_engine_api::middleware::{init_logging, init_metrics};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    init_logging(&config.logging).context("Failed to initialize logging")?;
    init_metrics().context("Failed to install Prometheus recorder")?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting webhook engine");

    let pool = persistence::db::create_pool(&(&config.database).into()).await?;

    info!("Running database migrations");
    persistence::db::run_migrations(&pool).await?;

    let store = Arc::new(PgWebhookStore::new(pool.clone()));
    let addr = config.socket_addr()?;
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    let state = AppState::new(config, pool.clone(), store)?;

    let mut scheduler = JobScheduler::new();
    scheduler.register(PoolMetricsJob::new(pool));
    if state.config.webhooks.retry_enabled {
        scheduler.register(WebhookRetryJob::new(
            state.deliveries.clone(),
            &state.config.webhooks,
        ));
    }
    if state.config.webhooks.cleanup_enabled {
        scheduler.register(WebhookCleanupJob::new(
            state.deliveries.clone(),
            state.config.webhooks.delivery_retention_days,
        ));
    }
    scheduler.start();

    let app = create_app(state);

    info!(%addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(shutdown_timeout).await;

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
