//! Cache client abstraction.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{MemoryCache, SqliteCache};
use crate::Error;
use crate::config::{CacheBackendKind, CacheConfig};

/// Key/value store with per-entry expiry.
///
/// Implementations must be safe to share between tasks and should bound
/// their own I/O time; callers treat every error as "cache unavailable".
#[async_trait]
pub trait CacheClient: Send + Sync + fmt::Debug {
    /// Get the value stored under `key`, or None if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Error>;

    /// Remove every key in `keys`. Missing keys are not an error.
    async fn delete(&self, keys: &[String]) -> Result<(), Error>;

    /// Drop every expired entry and return how many were removed.
    async fn purge_expired(&self) -> Result<u64, Error>;
}

/// Build the backend selected by `config`.
pub async fn from_config(config: &CacheConfig) -> Result<Arc<dyn CacheClient>, Error> {
    match config.backend {
        CacheBackendKind::Memory => {
            let cache = match config.max_entries {
                Some(max) => MemoryCache::with_capacity(max),
                None => MemoryCache::new(),
            };
            Ok(Arc::new(cache))
        }
        CacheBackendKind::Sqlite => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| Error::InvalidInput("cache.path is required for the sqlite backend".into()))?;
            Ok(Arc::new(SqliteCache::open(path).await?))
        }
    }
}
