//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `QUESTION_SELECTION__` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use question_selection::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.socket_addr().unwrap());
//! ```

mod database;
mod error;
mod features;
mod pool_health;
mod redis;
mod selection;
mod server;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use features::FeatureFlags;
pub use pool_health::PoolHealthConfig;
pub use redis::RedisConfig;
pub use selection::SelectionConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
/// Every section has defaults; `database` and `redis` are optional and select
/// the persistent adapters when present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL for the exposure ledger and pool index
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Redis for cross-instance reservations
    #[serde(default)]
    pub redis: Option<RedisConfig>,

    /// Selection engine and reservation tuning
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Pool health monitor
    #[serde(default)]
    pub pool_health: PoolHealthConfig,

    /// Feature flags
    #[serde(default)]
    pub features: FeatureFlags,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `QUESTION_SELECTION` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `QUESTION_SELECTION__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `QUESTION_SELECTION__SELECTION__PREFLIGHT_MARGIN=2.0` -> `selection.preflight_margin = 2.0`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("QUESTION_SELECTION")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        if let Some(redis) = &self.redis {
            redis.validate()?;
        }
        self.selection.validate()?;
        self.pool_health.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "QUESTION_SELECTION__DATABASE__URL",
        "QUESTION_SELECTION__REDIS__URL",
        "QUESTION_SELECTION__SERVER__PORT",
        "QUESTION_SELECTION__SERVER__ENVIRONMENT",
        "QUESTION_SELECTION__SELECTION__PREFLIGHT_MARGIN",
        "QUESTION_SELECTION__POOL_HEALTH__DEFAULT_THRESHOLD",
        "QUESTION_SELECTION__POOL_HEALTH__WATCHED_FILTERS",
    ];

    /// Helper to clear environment variables after testing
    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_with_no_environment_uses_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = AppConfig::load();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert!(config.database.is_none());
        assert!(config.redis.is_none());
        assert_eq!(config.selection.preflight_margin, 1.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_optional_backends() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("QUESTION_SELECTION__DATABASE__URL", "postgresql://test@localhost/test");
        env::set_var("QUESTION_SELECTION__REDIS__URL", "redis://localhost:6379");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(
            config.database.as_ref().map(|d| d.url.as_str()),
            Some("postgresql://test@localhost/test")
        );
        assert_eq!(
            config.redis.as_ref().map(|r| r.url.as_str()),
            Some("redis://localhost:6379")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nested_numeric_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("QUESTION_SELECTION__SERVER__PORT", "3000");
        env::set_var("QUESTION_SELECTION__SELECTION__PREFLIGHT_MARGIN", "2.0");
        env::set_var("QUESTION_SELECTION__POOL_HEALTH__DEFAULT_THRESHOLD", "50");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.selection.preflight_margin, 2.0);
        assert_eq!(config.pool_health.default_threshold, 50);
    }

    #[test]
    fn test_watched_filters_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var(
            "QUESTION_SELECTION__POOL_HEALTH__WATCHED_FILTERS",
            "skill=dsa;skill=sql,difficulty=hard",
        );
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.validate().is_ok());
        let buckets: Vec<String> = config
            .pool_health
            .watched_filters_list()
            .unwrap()
            .iter()
            .map(|f| f.bucket_key())
            .collect();
        assert_eq!(buckets, vec!["skill=dsa", "skill=sql,difficulty=hard"]);
    }

    #[test]
    fn test_is_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("QUESTION_SELECTION__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
    }

    #[test]
    fn test_validate_rejects_bad_optional_section() {
        let config = AppConfig {
            database: Some(DatabaseConfig {
                url: "mysql://localhost/test".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidDatabaseUrl)
        ));
    }
}
