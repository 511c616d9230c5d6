mod worker;

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tripnest_booking::ReservationManager;
use tripnest_store::app_config::Config;
use tripnest_store::HttpPaymentGateway;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tripnest_worker=debug,tripnest_booking=info,tripnest_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!(
        "Starting expiry worker ({:?} store, sweep every {}s)",
        config.store.backend,
        config.worker.sweep_interval_seconds
    );

    let store = tripnest_store::connect(&config.store)
        .await
        .context("Failed to connect to reservation store")?;
    let gateway = HttpPaymentGateway::new(&config.gateway).context("Failed to build payment gateway client")?;
    let manager = Arc::new(ReservationManager::new(store, Arc::new(gateway), config.booking.clone()));

    worker::start_expiry_worker(
        manager,
        Duration::from_secs(config.worker.sweep_interval_seconds.max(1)),
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        },
    )
    .await;

    tracing::info!("Expiry worker stopped");
    Ok(())
}
