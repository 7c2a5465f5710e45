use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;
use validator::Validate;

use crate::errors::ServiceError;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Default fulfillment policy values. The return window and the confirmation
/// grace period are both measured in whole days from the delivery timestamp.
const DEFAULT_RETURN_WINDOW_DAYS: i64 = 10;
const DEFAULT_CONFIRM_GRACE_DAYS: i64 = 10;
const DEFAULT_AUTO_CONFIRM_INTERVAL_SECS: u64 = 86_400;
const DEFAULT_ALLOCATION_MAX_RETRIES: u32 = 3;

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL (postgres or sqlite)
    pub database_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_env")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Days after delivery during which a return may be initiated
    #[serde(default = "default_return_window_days")]
    #[validate(range(min = 1, max = 365))]
    pub return_window_days: i64,

    /// Days after delivery before an unreturned package is auto-confirmed.
    /// Must be >= return_window_days, otherwise a return could race the
    /// confirmation scheduler.
    #[serde(default = "default_confirm_grace_days")]
    #[validate(range(min = 1, max = 365))]
    pub confirm_grace_days: i64,

    /// Seconds between auto-confirmation scheduler ticks
    #[serde(default = "default_auto_confirm_interval_secs")]
    pub auto_confirm_interval_secs: u64,

    /// Bounded retries for transaction conflicts during allocation and
    /// return processing
    #[serde(default = "default_allocation_max_retries")]
    pub allocation_max_retries: u32,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_env() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_return_window_days() -> i64 {
    DEFAULT_RETURN_WINDOW_DAYS
}
fn default_confirm_grace_days() -> i64 {
    DEFAULT_CONFIRM_GRACE_DAYS
}
fn default_auto_confirm_interval_secs() -> u64 {
    DEFAULT_AUTO_CONFIRM_INTERVAL_SECS
}
fn default_allocation_max_retries() -> u32 {
    DEFAULT_ALLOCATION_MAX_RETRIES
}

impl AppConfig {
    /// Convenience constructor used by tests and embedded setups.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: default_host(),
            port: default_port(),
            environment: "test".to_string(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            return_window_days: default_return_window_days(),
            confirm_grace_days: default_confirm_grace_days(),
            auto_confirm_interval_secs: default_auto_confirm_interval_secs(),
            allocation_max_retries: default_allocation_max_retries(),
        }
    }

    /// Validates field ranges and cross-field policy invariants.
    pub fn ensure_valid(&self) -> Result<(), ServiceError> {
        Validate::validate(self).map_err(|e| ServiceError::ConfigError(e.to_string()))?;

        if self.confirm_grace_days < self.return_window_days {
            return Err(ServiceError::ConfigError(format!(
                "confirm_grace_days ({}) must be >= return_window_days ({}): \
                 a shorter grace period would let auto-confirmation race an open return window",
                self.confirm_grace_days, self.return_window_days
            )));
        }

        if self.db_min_connections > self.db_max_connections {
            return Err(ServiceError::ConfigError(format!(
                "db_min_connections ({}) must be <= db_max_connections ({})",
                self.db_min_connections, self.db_max_connections
            )));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Loads configuration from layered sources: `config/default.toml`, then
/// `config/{environment}.toml`, then `APP_`-prefixed environment variables.
pub fn load_config() -> Result<AppConfig, ServiceError> {
    let environment = env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder();

    let default_path = Path::new(CONFIG_DIR).join("default");
    builder = builder.add_source(File::with_name(&default_path.to_string_lossy()).required(false));

    let env_path = Path::new(CONFIG_DIR).join(&environment);
    builder = builder.add_source(File::with_name(&env_path.to_string_lossy()).required(false));

    builder = builder.add_source(Environment::with_prefix("APP").separator("__"));

    let cfg: AppConfig = builder
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e: ConfigError| ServiceError::ConfigError(e.to_string()))?;

    cfg.ensure_valid()?;

    info!(
        environment = %cfg.environment,
        return_window_days = cfg.return_window_days,
        confirm_grace_days = cfg.confirm_grace_days,
        "Configuration loaded"
    );

    Ok(cfg)
}

/// Initializes the global tracing subscriber.
pub fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_valid() {
        let cfg = AppConfig::new("sqlite::memory:");
        assert!(cfg.ensure_valid().is_ok());
        assert_eq!(cfg.return_window_days, 10);
        assert_eq!(cfg.confirm_grace_days, 10);
    }

    #[test]
    fn grace_shorter_than_window_is_rejected() {
        let mut cfg = AppConfig::new("sqlite::memory:");
        cfg.confirm_grace_days = 7;
        cfg.return_window_days = 10;
        let err = cfg.ensure_valid().unwrap_err();
        assert!(err.to_string().contains("confirm_grace_days"));
    }

    #[test]
    fn out_of_range_window_is_rejected() {
        let mut cfg = AppConfig::new("sqlite::memory:");
        cfg.return_window_days = 0;
        assert!(cfg.ensure_valid().is_err());
    }
}
