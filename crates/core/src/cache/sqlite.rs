//! SQLite cache backend.
//!
//! Stores entries in a `cache_entries` table of a dedicated database file, so
//! several processes on one host can share the cache. Expiry is a unix
//! millisecond timestamp checked on read; rows stay until `purge_expired` runs.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, TransactionBehavior};

use super::CacheClient;
use crate::Error;
use crate::store::migrations;
use crate::store::{PoolOptions, SqlPool};

/// Cache backed by a key/value table.
#[derive(Clone, Debug)]
pub struct SqliteCache {
    pool: SqlPool,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl SqliteCache {
    /// Open (or create) the cache database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let options = PoolOptions { size: 2, migrations: migrations::CACHE, ..Default::default() };
        Ok(Self { pool: SqlPool::open(path, options).await? })
    }

    /// Open an in-memory cache database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        Ok(Self { pool: SqlPool::open_in_memory_with(migrations::CACHE).await? })
    }
}

fn unavailable(err: Error) -> Error {
    match err {
        Error::Cache(_) => err,
        other => Error::Cache(other.to_string()),
    }
}

#[async_trait]
impl CacheClient for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_string();
        let now = now_millis();
        self.pool
            .conn()
            .call(move |conn| -> Result<Option<String>, Error> {
                let mut stmt = conn.prepare_cached("SELECT value FROM cache_entries WHERE key = ?1 AND expires_at > ?2")?;

                let result = stmt.query_row(params![key, now], |row| row.get(0));

                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(|e| unavailable(Error::from(e)))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_string();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now_millis().saturating_add(ttl_ms);

        self.pool
            .conn()
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        expires_at = excluded.expires_at",
                    params![key, value, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| unavailable(Error::from(e)))
    }

    async fn delete(&self, keys: &[String]) -> Result<(), Error> {
        if keys.is_empty() {
            return Ok(());
        }

        let keys = keys.to_vec();
        self.pool
            .conn()
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                {
                    let mut stmt = tx.prepare_cached("DELETE FROM cache_entries WHERE key = ?1")?;
                    for key in &keys {
                        stmt.execute(params![key])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|e| unavailable(Error::from(e)))
    }

    async fn purge_expired(&self) -> Result<u64, Error> {
        let now = now_millis();
        let purged = self
            .pool
            .conn()
            .call(move |conn| -> Result<usize, Error> {
                Ok(conn.execute("DELETE FROM cache_entries WHERE expires_at <= ?1", params![now])?)
            })
            .await
            .map_err(|e| unavailable(Error::from(e)))?;

        tracing::debug!(purged, "purged expired cache entries");
        Ok(purged as u64)
    }
}
