//! Range and consistency checks run once every config layer is merged.

use crate::config::{AppConfig, CacheBackendKind};
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
    /// - `pool_size` is 0 or exceeds 64
    /// - `busy_timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `table` is empty
    /// - `cache.ttl_secs` is 0, or `cache.not_found_ttl_secs` exceeds it
    ///
    /// Returns `ConfigError::Missing` if the sqlite cache backend has no path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::Invalid { field: "pool_size".into(), reason: "must be greater than 0".into() });
        }
        if self.pool_size > 64 {
            return Err(ConfigError::Invalid { field: "pool_size".into(), reason: "must not exceed 64".into() });
        }

        if self.busy_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "busy_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.busy_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "busy_timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.table.is_empty() {
            return Err(ConfigError::Invalid { field: "table".into(), reason: "must not be empty".into() });
        }

        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Invalid { field: "cache.ttl_secs".into(), reason: "must be greater than 0".into() });
        }
        if self.cache.not_found_ttl_secs > self.cache.ttl_secs {
            return Err(ConfigError::Invalid {
                field: "cache.not_found_ttl_secs".into(),
                reason: "must not exceed cache.ttl_secs".into(),
            });
        }

        if self.cache.backend == CacheBackendKind::Sqlite {
            self.require_cache_path()?;
        }

        if self.cache.backend == CacheBackendKind::Sqlite && self.cache.max_entries.is_some() {
            tracing::warn!("cache.max_entries only applies to the memory backend; ignoring it");
        }

        Ok(())
    }
}
