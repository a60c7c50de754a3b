//! In-process cache backend.
//!
//! Uses a HashMap behind a tokio RwLock. Expired entries are skipped on read
//! and swept when a bounded cache runs out of room.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::CacheClient;
use crate::Error;

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Process-local cache.
///
/// Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    max_entries: Option<usize>,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache").field("max_entries", &self.max_entries).finish_non_exhaustive()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding at most `max_entries` keys.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self { entries: Arc::default(), max_entries: Some(max_entries.max(1)) }
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn make_room(entries: &mut HashMap<String, Entry>, max: usize, now: Instant) {
        if entries.len() < max {
            return;
        }

        entries.retain(|_, entry| !entry.is_expired(now));

        while entries.len() >= max {
            let Some(victim) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            entries.remove(&victim);
            tracing::debug!(key = %victim, "evicted cache entry");
        }
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let entries = self.entries.read().await;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Error> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        if let Some(max) = self.max_entries
            && !entries.contains_key(key)
        {
            Self::make_room(&mut entries, max, now);
        }

        entries.insert(key.to_string(), Entry { value: value.to_string(), expires_at: now + ttl });
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), Error> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, Error> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok((before - entries.len()) as u64)
    }
}
