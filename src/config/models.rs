use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub pool: PoolSettings,
}

/// HTTP client knobs shared by every built client
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpSettings {
    /// Whole-request timeout applied uniformly to every request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Idle connections kept alive per host, sized for high fan-out.
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
    #[serde(default = "default_pool_idle_timeout_secs")]
    pub pool_idle_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Worker pool defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolSettings {
    /// Worker count used when a job does not request one.
    #[serde(default = "default_workers")]
    pub default_workers: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            pool_idle_timeout_secs: default_pool_idle_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            default_workers: default_workers(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_pool_max_idle_per_host() -> usize {
    100
}

fn default_pool_idle_timeout_secs() -> u64 {
    90
}

fn default_user_agent() -> String {
    concat!("fetchpool/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_workers() -> usize {
    crate::pool::DEFAULT_NUM_WORKERS
}
