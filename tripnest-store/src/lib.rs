pub mod app_config;
pub mod database;
pub mod memory;
pub mod payment_gateway;
pub mod reservation_repo;
pub mod rest_repo;

pub use app_config::{Config, StoreBackend, StoreConfig};
pub use database::DbClient;
pub use memory::MemoryRecordStore;
pub use payment_gateway::HttpPaymentGateway;
pub use reservation_repo::PgRecordStore;
pub use rest_repo::RestRecordStore;

use std::sync::Arc;
use tracing::info;
use tripnest_core::repository::{RecordStore, StoreError};

/// Build the configured store backend. Postgres connections are migrated
/// before they are handed out.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn RecordStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory reservation store");
            Ok(Arc::new(MemoryRecordStore::new()))
        }
        StoreBackend::Postgres => {
            let db = DbClient::new(config).await?;
            db.migrate().await?;
            info!("Connected to Postgres reservation store");
            Ok(Arc::new(PgRecordStore::new(db.pool, config.timeout())))
        }
        StoreBackend::Rest => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| StoreError::Unavailable("store.api_key is required for the rest backend".into()))?;
            info!("Using REST reservation store at {}", config.url);
            Ok(Arc::new(RestRecordStore::new(config.url.clone(), api_key, config.timeout())?))
        }
    }
}
