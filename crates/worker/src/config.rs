//! Engine configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use linguist_core::worker_pool::{
    validate_pool_size, DEFAULT_MAX_JOBS_PER_TICK, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POOL_SIZE,
};

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Scheduling parameters for the worker pool and the poll loop.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of worker slots.
    pub pool_size: usize,
    /// Time between poll ticks.
    pub poll_interval: Duration,
    /// Upper bound on jobs fetched per tick.
    pub max_jobs_per_tick: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_jobs_per_tick: DEFAULT_MAX_JOBS_PER_TICK,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable             | Default |
    /// |----------------------|---------|
    /// | `WORKER_POOL_SIZE`   | `4`     |
    /// | `POLL_INTERVAL_SECS` | `10`    |
    /// | `MAX_JOBS_PER_TICK`  | `10`    |
    pub fn from_env() -> Result<Self, ConfigError> {
        let pool_size = env_or("WORKER_POOL_SIZE", DEFAULT_POOL_SIZE)?;
        validate_pool_size(pool_size).map_err(|e| ConfigError::Invalid {
            var: "WORKER_POOL_SIZE",
            value: pool_size.to_string(),
            reason: e.to_string(),
        })?;

        let poll_interval_secs: u64 = env_or("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "POLL_INTERVAL_SECS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let max_jobs_per_tick = env_or("MAX_JOBS_PER_TICK", DEFAULT_MAX_JOBS_PER_TICK)?;
        if max_jobs_per_tick == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_JOBS_PER_TICK",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            pool_size,
            poll_interval: Duration::from_secs(poll_interval_secs),
            max_jobs_per_tick,
        })
    }
}

/// Parse `var` if set, otherwise return `default`.
pub fn env_or<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

/// Read a variable that has no default.
pub fn env_required(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(var))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.max_jobs_per_tick, 10);
    }

    #[test]
    fn env_or_falls_back_when_unset() {
        let value: usize = env_or("LINGUIST_TEST_SURELY_UNSET_VAR", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn env_required_reports_missing_variable() {
        let err = env_required("LINGUIST_TEST_SURELY_UNSET_VAR").unwrap_err();
        assert_eq!(err.to_string(), "LINGUIST_TEST_SURELY_UNSET_VAR must be set");
    }
}
