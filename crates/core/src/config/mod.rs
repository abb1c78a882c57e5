//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (TITLESCOUT_*)
//! 2. TOML config file (if TITLESCOUT_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (TITLESCOUT_*)
/// 2. TOML config file (if TITLESCOUT_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache database.
    ///
    /// Set via TITLESCOUT_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Whether the persistent cache is enabled at all.
    ///
    /// When false every cache operation is a successful no-op.
    /// Set via TITLESCOUT_CACHE_ENABLED environment variable.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Interval between background cache sweeps, in seconds.
    ///
    /// Set via TITLESCOUT_CLEANUP_INTERVAL_SECS environment variable.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// TMDB API key for the movie-database adapter.
    ///
    /// Set via TITLESCOUT_TMDB_API_KEY environment variable.
    /// Required only when the TMDB adapter is used.
    #[serde(default)]
    pub tmdb_api_key: Option<String>,

    /// Whether to respect robots.txt rules on scraped sources.
    ///
    /// Set via TITLESCOUT_RESPECT_ROBOTS environment variable.
    #[serde(default = "default_true")]
    pub respect_robots: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./titlescout-cache.sqlite")
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_enabled: true,
            cleanup_interval_secs: default_cleanup_interval_secs(),
            tmdb_api_key: None,
            respect_robots: true,
        }
    }
}

impl AppConfig {
    /// Cleanup interval as a Duration for the sweep task.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `TITLESCOUT_`
    /// 2. TOML file from `TITLESCOUT_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, the environment
    /// cannot be parsed, or validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TITLESCOUT_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("TITLESCOUT_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check that the TMDB API key is available (deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the key is not set.
    pub fn require_tmdb_api_key(&self) -> Result<&str, ConfigError> {
        self.tmdb_api_key.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "tmdb_api_key".into(),
            hint: "Set TITLESCOUT_TMDB_API_KEY environment variable".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./titlescout-cache.sqlite"));
        assert!(config.cache_enabled);
        assert_eq!(config.cleanup_interval_secs, 3600);
        assert!(config.tmdb_api_key.is_none());
        assert!(config.respect_robots);
    }

    #[test]
    fn test_cleanup_interval_duration() {
        let config = AppConfig::default();
        assert_eq!(config.cleanup_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn test_require_tmdb_api_key_missing() {
        let config = AppConfig::default();
        assert!(matches!(config.require_tmdb_api_key(), Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_require_tmdb_api_key_present() {
        let config = AppConfig { tmdb_api_key: Some("test-key".into()), ..Default::default() };
        assert_eq!(config.require_tmdb_api_key().unwrap(), "test-key");
    }
}
