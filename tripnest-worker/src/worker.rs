use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tripnest_booking::ReservationManager;

/// Sweep abandoned `pending` reservations every `interval` until `shutdown` resolves.
pub async fn start_expiry_worker(
    manager: Arc<ReservationManager>,
    interval: Duration,
    shutdown: impl Future<Output = ()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!("Expiry worker started, sweeping every {:?}", interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sweep(&manager).await;
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }
}

/// One pass; failures are logged and retried on the next tick.
pub async fn sweep(manager: &ReservationManager) -> usize {
    match manager.expire_abandoned(Utc::now()).await {
        Ok(expired) if expired.is_empty() => 0,
        Ok(expired) => {
            info!("Expired {} abandoned reservations", expired.len());
            expired.len()
        }
        Err(e) => {
            error!("Expiry sweep failed: {}", e);
            0
        }
    }
}
