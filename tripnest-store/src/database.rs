use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use tripnest_core::repository::StoreError;

use crate::app_config::StoreConfig;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        // Rows are rendered through to_jsonb; keep timestamps in UTC so day
        // boundaries do not shift with the server's zone.
        let options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| StoreError::Unavailable(format!("invalid database url: {}", e)))?
            .options([("timezone", "UTC")]);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("connect: {}", e)))?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migrate: {}", e)))?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}
