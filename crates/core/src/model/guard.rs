//! Pending cache invalidation for a write in flight.
//!
//! A write arms an `Invalidation` before it touches the store. If the write
//! future is dropped before the invalidation ran, the keys are deleted from a
//! spawned task instead, since the commit may already have happened. Both
//! paths delete while holding the keys' locks, so a reader that loaded the
//! old row cannot cache it after the delete.

use std::sync::Arc;

use super::flight::KeyedLock;
use crate::Error;
use crate::cache::CacheClient;

pub(crate) struct Invalidation {
    cache: Arc<dyn CacheClient>,
    locks: KeyedLock,
    keys: Vec<String>,
    armed: bool,
}

impl Invalidation {
    pub fn new(cache: Arc<dyn CacheClient>, locks: KeyedLock, keys: Vec<String>) -> Self {
        Self { cache, locks, keys, armed: true }
    }

    pub fn push(&mut self, key: String) {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Nothing was committed; drop without touching the cache.
    pub fn disarm(mut self) {
        self.armed = false;
    }

    /// Lock the keys and delete them now.
    ///
    /// The guard stays armed until the delete returns, so a cancellation
    /// while waiting or deleting still schedules it.
    pub async fn run(mut self) -> Result<(), Error> {
        let _held = self.locks.lock_all(&self.keys).await;
        let result = self.cache.delete(&self.keys).await;
        self.armed = false;
        result
    }
}

impl Drop for Invalidation {
    fn drop(&mut self) {
        if !self.armed || self.keys.is_empty() {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(keys = ?self.keys, "write cancelled outside a runtime; cache keys left to expire");
            return;
        };

        let cache = Arc::clone(&self.cache);
        let locks = self.locks.clone();
        let keys = std::mem::take(&mut self.keys);
        tracing::debug!(keys = ?keys, "write cancelled; invalidating in background");
        handle.spawn(async move {
            let _held = locks.lock_all(&keys).await;
            if let Err(e) = cache.delete(&keys).await {
                tracing::warn!(error = %e, keys = ?keys, "background invalidation failed");
            }
        });
    }
}
