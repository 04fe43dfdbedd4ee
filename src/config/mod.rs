//! Configuration management for fetchpool
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use fetchpool::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Request timeout: {}s", config.http.request_timeout_secs);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the
//! pattern `FETCHPOOL__<section>__<key>`:
//!
//! - `FETCHPOOL__HTTP__REQUEST_TIMEOUT_SECS=30`
//! - `FETCHPOOL__POOL__DEFAULT_WORKERS=4`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/fetchpool.toml`.
//! This can be overridden using the `FETCHPOOL_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{Config, HttpSettings, PoolSettings};
pub use validation::ValidationError;

use once_cell::sync::Lazy;
use thiserror::Error;

static SHARED: Lazy<Config> = Lazy::new(|| {
    Config::load().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Falling back to default configuration");
        Config::default()
    })
});

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Process-wide configuration, loaded once on first use.
    ///
    /// The client registry and the worker pool consult this for their
    /// defaults. Falls back to default values (with a warning) if loading
    /// fails, so library consumers are not forced to handle configuration
    /// errors at every call site.
    pub fn shared() -> &'static Config {
        &SHARED
    }

    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a value
    /// fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn load_from_path_applies_validation() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bad.toml");

        fs::write(&config_path, "[pool]\ndefault_workers = 0\n").unwrap();

        let err = Config::load_from_path(config_path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn load_from_path_with_valid_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("good.toml");

        fs::write(&config_path, "[http]\nrequest_timeout_secs = 10\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.http.request_timeout_secs, 10);
        assert_eq!(config.pool.default_workers, 10);
    }

    #[test]
    fn shared_config_always_satisfies_validation() {
        // Whether loaded or fallen back to defaults, consumers can rely on
        // validated values.
        assert!(Config::shared().pool.default_workers >= 1);
        assert!(Config::shared().http.request_timeout_secs >= 1);
    }
}
