//! Configuration structures
//!
//! Every section has defaults so partial TOML/JSON files and environment
//! overrides stay valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DB_PATH, DEFAULT_DB_POOL_SIZE, DEFAULT_FLAG_CACHE_TTL_SECS,
    DEFAULT_FLAG_REFRESH_TIMEOUT_MS,
};
use crate::errors::{CortexError, Result};

/// Top-level configuration for the flag engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub flags: FlagCacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values every loader must refuse, wherever they came from.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(CortexError::Config("database.path must not be empty".into()));
        }
        if self.flags.refresh_timeout_ms == 0 {
            return Err(CortexError::Config("flags.refresh_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Flag store location and pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// SQLCipher key. Plain SQLite is used when absent.
    #[serde(default)]
    pub encryption_key: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path(), pool_size: default_pool_size(), encryption_key: None }
    }
}

/// Flag snapshot freshness and refresh bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagCacheConfig {
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_refresh_timeout_ms")]
    pub refresh_timeout_ms: u64,
}

impl FlagCacheConfig {
    /// Snapshot time-to-live.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Upper bound on a single repository read during refresh.
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }
}

impl Default for FlagCacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: default_ttl_seconds(), refresh_timeout_ms: default_refresh_timeout_ms() }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

const fn default_pool_size() -> u32 {
    DEFAULT_DB_POOL_SIZE
}

const fn default_ttl_seconds() -> u64 {
    DEFAULT_FLAG_CACHE_TTL_SECS
}

const fn default_refresh_timeout_ms() -> u64 {
    DEFAULT_FLAG_REFRESH_TIMEOUT_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_cache_defaults_to_five_minutes() {
        let config = FlagCacheConfig::default();
        assert_eq!(config.ttl(), Duration::from_secs(300));
        assert_eq!(config.refresh_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "flags": { "ttl_seconds": 30 } }"#).expect("valid json");

        assert_eq!(config.flags.ttl_seconds, 30);
        assert_eq!(config.flags.refresh_timeout_ms, DEFAULT_FLAG_REFRESH_TIMEOUT_MS);
        assert_eq!(config.database, DatabaseConfig::default());
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn validate_rejects_zero_refresh_timeout() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.flags.refresh_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(CortexError::Config(msg)) if msg.contains("refresh_timeout_ms")));
    }

    #[test]
    fn validate_rejects_blank_database_path() {
        let mut config = Config::default();
        config.database.path = "  ".into();
        assert!(matches!(config.validate(), Err(CortexError::Config(_))));
    }
}
