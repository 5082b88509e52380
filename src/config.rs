//! Configuration for the dispatch engine
//!
//! One `DispatcherConfig` per backend connector. All sections are optional
//! in the TOML source and fall back to their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub media_cache: MediaCacheConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum tokens the bucket can hold
    pub capacity: u32,
    /// Tokens refilled per second
    pub rate_per_sec: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            rate_per_sec: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum idle connections retained
    pub size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { size: 4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaCacheConfig {
    /// Maximum cached upload results before LRU eviction
    pub capacity: usize,
}

impl Default for MediaCacheConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Longest the runner sleeps between queue checks
    pub max_poll_interval_secs: u64,
    /// Shortest the runner sleeps, so newly scheduled earlier posts are seen
    pub min_wake_secs: u64,
    /// Pause after an unexpected runner error before the next iteration
    pub error_cooldown_secs: u64,
}

impl SchedulerConfig {
    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_secs(self.max_poll_interval_secs)
    }

    pub fn min_wake(&self) -> Duration {
        Duration::from_secs(self.min_wake_secs)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.error_cooldown_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_poll_interval_secs: 60,
            min_wake_secs: 1,
            error_cooldown_secs: 5,
        }
    }
}

impl DispatcherConfig {
    /// Load configuration from a TOML file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: DispatcherConfig =
            toml::from_str(content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = DispatcherConfig::default();

        assert_eq!(config.rate_limit.capacity, 10);
        assert_eq!(config.rate_limit.rate_per_sec, 5.0);
        assert_eq!(config.pool.size, 4);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay(), Duration::from_secs(1));
        assert_eq!(config.media_cache.capacity, 64);
        assert_eq!(config.scheduler.max_poll_interval(), Duration::from_secs(60));
        assert_eq!(config.scheduler.min_wake(), Duration::from_secs(1));
        assert_eq!(config.scheduler.error_cooldown(), Duration::from_secs(5));
    }

    #[test]
    fn test_from_toml_partial_sections() {
        let config = DispatcherConfig::from_toml(
            r#"
            [rate_limit]
            capacity = 100
            rate_per_sec = 25.0

            [pool]
            size = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.rate_limit.capacity, 100);
        assert_eq!(config.pool.size, 8);
        // Untouched sections keep their defaults
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.media_cache.capacity, 64);
    }

    #[test]
    fn test_from_toml_empty() {
        let config = DispatcherConfig::from_toml("").unwrap();
        assert_eq!(config.rate_limit.capacity, 10);
    }

    #[test]
    fn test_from_toml_invalid() {
        let result = DispatcherConfig::from_toml("rate_limit = \"not a table\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pulsepost.toml");
        std::fs::write(
            &path,
            r#"
            [retry]
            max_attempts = 5
            base_delay_ms = 250

            [scheduler]
            max_poll_interval_secs = 10
            min_wake_secs = 1
            error_cooldown_secs = 2
            "#,
        )
        .unwrap();

        let config = DispatcherConfig::load_from_path(&path).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay(), Duration::from_millis(250));
        assert_eq!(config.scheduler.max_poll_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let result = DispatcherConfig::load_from_path(Path::new("/nonexistent/pulsepost.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_toml_round_trip() {
        let config = DispatcherConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let parsed = DispatcherConfig::from_toml(&serialized).unwrap();

        assert_eq!(parsed.rate_limit.capacity, config.rate_limit.capacity);
        assert_eq!(parsed.pool.size, config.pool.size);
        assert_eq!(parsed.retry.max_attempts, config.retry.max_attempts);
    }
}
