use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("http.request_timeout_secs must be positive")]
    ZeroRequestTimeout,

    #[error("http.pool_idle_timeout_secs must be positive")]
    ZeroIdleTimeout,

    #[error("http.user_agent must not be empty")]
    EmptyUserAgent,

    #[error("pool.default_workers must be positive")]
    ZeroDefaultWorkers,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    if config.http.request_timeout_secs == 0 {
        return Err(ValidationError::ZeroRequestTimeout);
    }

    if config.http.pool_idle_timeout_secs == 0 {
        return Err(ValidationError::ZeroIdleTimeout);
    }

    if config.http.user_agent.trim().is_empty() {
        return Err(ValidationError::EmptyUserAgent);
    }

    if config.pool.default_workers == 0 {
        return Err(ValidationError::ZeroDefaultWorkers);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = Config::default();
        config.http.request_timeout_secs = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroRequestTimeout)
        ));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut config = Config::default();
        config.pool.default_workers = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroDefaultWorkers)
        ));
    }

    #[test]
    fn blank_user_agent_is_rejected() {
        let mut config = Config::default();
        config.http.user_agent = "  ".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::EmptyUserAgent)
        ));
    }
}
