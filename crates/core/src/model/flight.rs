//! Per-key async locks.
//!
//! Readers that miss take the lock for their key before querying the store,
//! so concurrent misses for one key collapse into a single query. Writers
//! take the locks for the keys they invalidate, so a reader cannot put a row
//! it read before the commit back into the cache after the invalidation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
struct Slot {
    lock: Arc<AsyncMutex<()>>,
    /// Holders plus waiters. The slot leaves the map when this reaches zero.
    users: usize,
}

/// Clones share the same set of locks.
#[derive(Debug, Clone, Default)]
pub(crate) struct KeyedLock {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

/// Held lock on one key. Unlocks on drop.
pub(crate) struct KeyGuard {
    owner: KeyedLock,
    key: String,
    held: Option<OwnedMutexGuard<()>>,
}

impl KeyedLock {
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let lock = {
            let mut slots = self.slots();
            let slot = slots.entry(key.to_string()).or_default();
            slot.users += 1;
            Arc::clone(&slot.lock)
        };

        // counted before waiting, so a waiter that is cancelled still releases the slot
        let mut guard = KeyGuard { owner: self.clone(), key: key.to_string(), held: None };
        guard.held = Some(lock.lock_owned().await);
        guard
    }

    /// Lock several keys in sorted order, so that two writers never wait on each other in a cycle.
    pub async fn lock_all(&self, keys: &[String]) -> Vec<KeyGuard> {
        let mut sorted: Vec<&String> = keys.iter().collect();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for key in sorted {
            guards.push(self.lock(key).await);
        }
        guards
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub fn active(&self) -> usize {
        self.slots().len()
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.held.take());

        let mut slots = self.owner.slots();
        if let Some(slot) = slots.get_mut(&self.key) {
            slot.users -= 1;
            if slot.users == 0 {
                slots.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_slot_removed_after_release() {
        let locks = KeyedLock::default();
        {
            let _guard = locks.lock("a").await;
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = KeyedLock::default();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock("shared").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLock::default();
        let _a = locks.lock("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_releases_slot() {
        let locks = KeyedLock::default();
        let holder = locks.lock("a").await;

        let waiter = tokio::time::timeout(Duration::from_millis(10), locks.lock("a")).await;
        assert!(waiter.is_err());
        assert_eq!(locks.active(), 1);

        drop(holder);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_lock_all_dedups() {
        let locks = KeyedLock::default();
        let keys = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        let guards = locks.lock_all(&keys).await;
        assert_eq!(guards.len(), 2);
        assert_eq!(locks.active(), 2);
    }
}
