use serde::Deserialize;
use std::env;
use std::time::Duration;
use tripnest_core::rules::BookingRules;
use tripnest_shared::pii::Masked;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub booking: BookingRules,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
    Rest,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Postgres connection string, or the REST base url.
    #[serde(default)]
    pub url: String,
    pub api_key: Option<Masked<String>>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: String::new(),
            api_key: None,
            timeout_seconds: default_timeout_seconds(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: Masked<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_connections() -> u32 {
    5
}

fn default_sweep_interval() -> u64 {
    60
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `TRIPNEST__STORE__BACKEND=postgres`
            .add_source(config::Environment::with_prefix("TRIPNEST").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripnest_core::rules::CancelledPolicy;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = Config::from_toml_str(
            r#"
            [store]
            backend = "postgres"
            url = "postgres://localhost/tripnest"

            [gateway]
            base_url = "https://payments.example.com/v1"
            api_key = "sk_test_123"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert_eq!(config.store.timeout(), Duration::from_secs(30));
        assert_eq!(config.store.max_connections, 5);
        assert_eq!(config.booking.currency, "usd");
        assert_eq!(config.booking.cancelled_reservations, CancelledPolicy::Block);
        assert_eq!(config.worker.sweep_interval_seconds, 60);
        assert!(!format!("{:?}", config.gateway).contains("sk_test_123"));
    }

    #[test]
    fn test_booking_rules_override() {
        let config = Config::from_toml_str(
            r#"
            [store]
            backend = "memory"

            [gateway]
            base_url = "http://localhost:9000"
            api_key = "sk_test_123"

            [booking]
            cancelled_reservations = "ignore"
            pending_ttl_seconds = 600
            "#,
        )
        .unwrap();

        assert_eq!(config.booking.cancelled_reservations, CancelledPolicy::Ignore);
        assert_eq!(config.booking.pending_ttl_seconds, 600);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let result = Config::from_toml_str(
            r#"
            [store]
            backend = "mongo"

            [gateway]
            base_url = "http://localhost:9000"
            api_key = "k"
            "#,
        );
        assert!(result.is_err());
    }
}
