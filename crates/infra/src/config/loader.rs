//! Configuration loader
//!
//! Loads engine configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `CORTEX_DB_PATH` is missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `CORTEX_DB_PATH`: Database file path (required for env loading)
//! - `CORTEX_DB_POOL_SIZE`: Connection pool size
//! - `CORTEX_DB_ENCRYPTION_KEY`: SQLCipher key
//! - `CORTEX_FLAG_CACHE_TTL_SECS`: Flag snapshot time-to-live
//! - `CORTEX_FLAG_REFRESH_TIMEOUT_MS`: Bound on a single refresh read
//! - `CORTEX_LOG_LEVEL`: Default log filter
//! - `CORTEX_LOG_JSON`: Emit JSON logs (true/false)
//!
//! ## File Locations
//! The loader probes `config.{json,toml}` and `cortex.{json,toml}` in the
//! current directory, its two parents, and the executable's directory.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use cortex_domain::{Config, CortexError, DatabaseConfig, FlagCacheConfig, LoggingConfig, Result};

const CONFIG_FILE_NAMES: [&str; 4] = ["config.json", "config.toml", "cortex.json", "cortex.toml"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `CortexError::Config` if configuration cannot be loaded from
/// either source or a value is malformed.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `CORTEX_DB_PATH` is required; every other value falls back to its
/// default when unset.
///
/// # Errors
/// Returns `CortexError::Config` if `CORTEX_DB_PATH` is missing or a set
/// variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let defaults = Config::default();

    let database = DatabaseConfig {
        path: env_var("CORTEX_DB_PATH")?,
        pool_size: env_parse("CORTEX_DB_POOL_SIZE", "pool size")?
            .unwrap_or(defaults.database.pool_size),
        encryption_key: std::env::var("CORTEX_DB_ENCRYPTION_KEY").ok(),
    };

    let flags = FlagCacheConfig {
        ttl_seconds: env_parse("CORTEX_FLAG_CACHE_TTL_SECS", "flag cache ttl")?
            .unwrap_or(defaults.flags.ttl_seconds),
        refresh_timeout_ms: env_parse("CORTEX_FLAG_REFRESH_TIMEOUT_MS", "flag refresh timeout")?
            .unwrap_or(defaults.flags.refresh_timeout_ms),
    };

    let logging = LoggingConfig {
        level: std::env::var("CORTEX_LOG_LEVEL").unwrap_or(defaults.logging.level),
        json: env_bool("CORTEX_LOG_JSON", defaults.logging.json),
    };

    let config = Config { database, flags, logging };
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `CortexError::Config` if the file is missing, unreadable, in an
/// unsupported format, or invalid.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CortexError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CortexError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CortexError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration, choosing the format by file extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    let config: Config = match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CortexError::Config(format!("Invalid TOML format: {}", e)))?,
        "json" => serde_json::from_str(contents)
            .map_err(|e| CortexError::Config(format!("Invalid JSON format: {}", e)))?,
        _ => return Err(CortexError::Config(format!("Unsupported config format: {}", extension))),
    };

    config.validate()?;
    Ok(config)
}

/// Probe the standard locations for a configuration file.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd.clone());
        roots.push(cwd.join(".."));
        roots.push(cwd.join("../.."));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        CortexError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Parse an optional environment variable, failing only on malformed values.
fn env_parse<T>(key: &str, label: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CortexError::Config(format!("Invalid {}: {}", label, e))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
