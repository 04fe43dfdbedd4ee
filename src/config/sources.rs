use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "FETCHPOOL_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/fetchpool.toml";
const ENV_PREFIX: &str = "FETCHPOOL";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    load_with_environment(config_path, environment_source())
}

/// Environment-variable source reading `FETCHPOOL__SECTION__KEY` overrides
/// from the process environment.
fn environment_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}

/// Load with an explicit environment source, so tests can inject variables
/// without mutating the process environment.
fn load_with_environment(
    config_path: PathBuf,
    environment: Environment,
) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // FETCHPOOL__HTTP__REQUEST_TIMEOUT_SECS -> http.request_timeout_secs
    builder = builder.add_source(environment);

    let config = builder.build()?;
    config.try_deserialize()
}
