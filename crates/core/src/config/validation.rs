//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cleanup_interval_secs` is under 1 minute or over 24 hours
    /// - `db_path` is empty while the cache is enabled
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cleanup_interval_secs < 60 {
            return Err(ConfigError::Invalid {
                field: "cleanup_interval_secs".into(),
                reason: "must be at least 60 seconds".into(),
            });
        }
        if self.cleanup_interval_secs > 86_400 {
            return Err(ConfigError::Invalid {
                field: "cleanup_interval_secs".into(),
                reason: "must not exceed 24 hours (86400 seconds)".into(),
            });
        }

        if self.cache_enabled && self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "db_path".into(),
                reason: "must not be empty while cache_enabled is true".into(),
            });
        }

        if !self.cache_enabled {
            tracing::warn!("persistent cache disabled; every lookup will hit the remote sources");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_cleanup_interval_too_small() {
        let config = AppConfig { cleanup_interval_secs: 30, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cleanup_interval_secs"));
    }

    #[test]
    fn test_validate_cleanup_interval_too_large() {
        let config = AppConfig { cleanup_interval_secs: 86_401, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cleanup_interval_secs"));
    }

    #[test]
    fn test_validate_empty_db_path() {
        let config = AppConfig { db_path: PathBuf::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "db_path"));
    }

    #[test]
    fn test_validate_empty_db_path_ok_when_disabled() {
        let config = AppConfig { db_path: PathBuf::new(), cache_enabled: false, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { cleanup_interval_secs: 60, ..Default::default() };
        assert!(config.validate().is_ok());

        let config = AppConfig { cleanup_interval_secs: 86_400, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
