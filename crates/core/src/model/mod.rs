//! Cache-aside data access for single-table entities.
//!
//! Reads check the cache, fall back to the store on a miss and populate the
//! cache afterwards, including a short-lived placeholder for rows that do not
//! exist. Writes go to the store first and invalidate the affected keys once
//! the transaction has committed; they never populate the cache.
//!
//! Cache failures are logged and counted, then treated as misses. Store
//! failures propagate to the caller.

mod book;
mod entity;
mod flight;
mod guard;


pub use book::{Book, BookModel};
pub use entity::Entity;

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, TransactionBehavior, params_from_iter, types::Value};

use crate::Error;
use crate::cache::{CacheClient, CacheKey};
use crate::config::CacheConfig;
use crate::store::SqlPool;
use entity::{Queries, is_identifier};
use flight::KeyedLock;
use guard::Invalidation;

/// Cached value meaning "the store has no such row".
const PLACEHOLDER: &str = "*";

/// Fraction of an expiry randomly added or removed so entries written together don't expire together.
const EXPIRY_DEVIATION: f64 = 0.05;

/// Expiries for cached entries.
#[derive(Debug, Clone)]
pub struct ModelOptions {
    pub ttl: Duration,
    pub not_found_ttl: Duration,
}

impl Default for ModelOptions {
    fn default() -> Self {
        CacheConfig::default().into()
    }
}

impl From<&CacheConfig> for ModelOptions {
    fn from(config: &CacheConfig) -> Self {
        Self { ttl: config.ttl(), not_found_ttl: config.not_found_ttl() }
    }
}

impl From<CacheConfig> for ModelOptions {
    fn from(config: CacheConfig) -> Self {
        (&config).into()
    }
}

/// Counters since the model was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModelStats {
    /// Statements sent to the store.
    pub db_queries: u64,
    /// Lookups answered by the cache, placeholders included.
    pub cache_hits: u64,
    /// Lookups that had to go to the store.
    pub cache_misses: u64,
    /// Cache operations that failed and were ignored.
    pub cache_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    db_queries: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_errors: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Cache-aside model over one table.
///
/// Safe to share between tasks; wrap it in an `Arc` and call it concurrently.
pub struct CachedModel<E: Entity> {
    pool: SqlPool,
    cache: Arc<dyn CacheClient>,
    table: String,
    queries: Arc<Queries>,
    options: ModelOptions,
    flights: KeyedLock,
    counters: Counters,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> std::fmt::Debug for CachedModel<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedModel")
            .field("entity", &E::NAME)
            .field("table", &self.table)
            .field("cache", &self.cache)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<E: Entity> CachedModel<E> {
    /// Build a model over `table`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `table` is not a plain identifier or
    /// does not exist, and `Error::Database` if the store cannot be reached.
    pub async fn new(
        pool: SqlPool, cache: Arc<dyn CacheClient>, table: &str, options: ModelOptions,
    ) -> Result<Self, Error> {
        if !is_identifier(table) {
            return Err(Error::InvalidInput(format!("invalid table name: {table:?}")));
        }
        debug_assert!(E::COLUMNS.contains(&E::UNIQUE));

        let name = table.to_string();
        let exists: bool = pool
            .conn()
            .call(move |conn| {
                conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
                    params![name],
                    |row| row.get(0),
                )
            })
            .await?;
        if !exists {
            return Err(Error::InvalidInput(format!("table {table} does not exist")));
        }

        tracing::info!(entity = E::NAME, table, ttl = ?options.ttl, "model ready");

        Ok(Self {
            pool,
            cache,
            table: table.to_string(),
            queries: Arc::new(Queries::new::<E>(table)),
            options,
            flights: KeyedLock::default(),
            counters: Counters::default(),
            _entity: PhantomData,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats {
            db_queries: self.counters.db_queries.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
            cache_errors: self.counters.cache_errors.load(Ordering::Relaxed),
        }
    }

    /// Look up a row by primary key.
    pub async fn find_one(&self, id: i64) -> Result<Option<E>, Error> {
        let key = CacheKey::primary(E::NAME, id);
        self.cached(&key, || self.fetch_by_id(id)).await
    }

    /// Look up a row by its unique secondary column.
    ///
    /// The index entry maps the value to a primary key; the row itself comes
    /// from `find_one`. An index entry that no longer agrees with the row is
    /// dropped and the store is asked directly.
    pub async fn find_one_by_unique(&self, value: &str) -> Result<Option<E>, Error> {
        let index_key = CacheKey::unique(E::NAME, E::UNIQUE, value);
        let lookup = value.to_string();
        let Some(id) = self.cached(&index_key, || self.fetch_id_by_unique(lookup)).await? else {
            return Ok(None);
        };

        match self.find_one(id).await? {
            Some(row) if row.unique_value() == value => Ok(Some(row)),
            _ => {
                tracing::debug!(key = %index_key, id, "index entry out of date");
                self.invalidate_now(vec![index_key.to_string()]).await;
                self.fetch_by_unique(value.to_string()).await
            }
        }
    }

    /// Insert a new row and return its primary key.
    ///
    /// Any id already set on `row` is ignored.
    ///
    /// # Errors
    ///
    /// Returns a conflicting `Error::ConstraintViolation` if the unique column already holds the value.
    pub async fn insert(&self, row: &E) -> Result<i64, Error> {
        let mut pending = self.pending(vec![self.unique_key(row.unique_value())]);

        let values = row.values();
        let queries = Arc::clone(&self.queries);
        bump(&self.counters.db_queries);
        let result = self
            .pool
            .conn()
            .call(move |conn| -> Result<i64, Error> {
                conn.prepare_cached(&queries.insert)?.execute(params_from_iter(values))?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from);

        let id = match result {
            Ok(id) => id,
            Err(e) => {
                pending.disarm();
                return Err(e);
            }
        };

        pending.push(CacheKey::primary(E::NAME, id).to_string());
        self.finish_write(pending).await;
        tracing::debug!(entity = E::NAME, id, "inserted");
        Ok(id)
    }

    /// Write every column of `row` by primary key.
    ///
    /// Returns false if no row has that id.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `row` has no id, and
    /// a conflicting `Error::ConstraintViolation` if the new unique value is taken.
    pub async fn update(&self, row: &E) -> Result<bool, Error> {
        let id = row
            .id()
            .ok_or_else(|| Error::InvalidInput(format!("cannot update {} without an id", E::NAME)))?;

        let mut pending =
            self.pending(vec![CacheKey::primary(E::NAME, id).to_string(), self.unique_key(row.unique_value())]);

        let mut values = row.values();
        values.push(Value::Integer(id));
        let queries = Arc::clone(&self.queries);
        bump(&self.counters.db_queries);
        let result = self
            .pool
            .conn()
            .call(move |conn| -> Result<Option<String>, Error> {
                // immediate, so the write lock waits on busy_timeout instead of failing mid-transaction
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let Some(previous) = select_unique(&tx, &queries, id)? else {
                    return Ok(None);
                };
                tx.prepare_cached(&queries.update)?.execute(params_from_iter(values))?;
                tx.commit()?;
                Ok(Some(previous))
            })
            .await
            .map_err(Error::from);

        match result {
            Ok(Some(previous)) => {
                pending.push(self.unique_key(&previous));
                self.finish_write(pending).await;
                tracing::debug!(entity = E::NAME, id, "updated");
                Ok(true)
            }
            Ok(None) => {
                pending.disarm();
                Ok(false)
            }
            Err(e) => {
                pending.disarm();
                Err(e)
            }
        }
    }

    /// Delete a row by primary key.
    ///
    /// Returns false if no row has that id.
    pub async fn delete(&self, id: i64) -> Result<bool, Error> {
        let mut pending = self.pending(vec![CacheKey::primary(E::NAME, id).to_string()]);

        let queries = Arc::clone(&self.queries);
        bump(&self.counters.db_queries);
        let result = self
            .pool
            .conn()
            .call(move |conn| -> Result<Option<String>, Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let Some(previous) = select_unique(&tx, &queries, id)? else {
                    return Ok(None);
                };
                tx.prepare_cached(&queries.delete)?.execute(params![id])?;
                tx.commit()?;
                Ok(Some(previous))
            })
            .await
            .map_err(Error::from);

        match result {
            Ok(Some(previous)) => {
                pending.push(self.unique_key(&previous));
                self.finish_write(pending).await;
                tracing::debug!(entity = E::NAME, id, "deleted");
                Ok(true)
            }
            Ok(None) => {
                pending.disarm();
                Ok(false)
            }
            Err(e) => {
                pending.disarm();
                Err(e)
            }
        }
    }

    fn unique_key(&self, value: &str) -> String {
        CacheKey::unique(E::NAME, E::UNIQUE, value).to_string()
    }

    /// Cache-aside read of one key.
    ///
    /// A miss takes the key's lock and checks the cache again before asking
    /// the store, so concurrent misses share one query.
    async fn cached<T, F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<Option<T>, Error>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, Error>>,
    {
        let key = key.to_string();

        if let Some(hit) = self.cache_get(&key).await {
            bump(&self.counters.cache_hits);
            tracing::debug!(key = %key, "cache hit");
            return Ok(hit);
        }
        bump(&self.counters.cache_misses);

        let _flight = self.flights.lock(&key).await;
        if let Some(hit) = self.cache_get(&key).await {
            tracing::debug!(key = %key, "cache filled by concurrent lookup");
            return Ok(hit);
        }

        tracing::debug!(key = %key, "cache miss");
        let fresh = fetch().await?;
        self.cache_put(&key, fresh.as_ref()).await;
        Ok(fresh)
    }

    /// `Some(Some(v))` for a cached value, `Some(None)` for the placeholder,
    /// `None` when the cache cannot answer.
    async fn cache_get<T: DeserializeOwned>(&self, key: &str) -> Option<Option<T>> {
        let raw = match self.cache.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                bump(&self.counters.cache_errors);
                tracing::warn!(key, error = %e, "cache get failed; falling back to store");
                return None;
            }
        };

        if raw == PLACEHOLDER {
            return Some(None);
        }

        match serde_json::from_str(&raw) {
            Ok(value) => Some(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "undecodable cache entry; dropping it");
                if let Err(e) = self.cache.delete(&[key.to_string()]).await {
                    bump(&self.counters.cache_errors);
                    tracing::warn!(key, error = %e, "cache delete failed");
                }
                None
            }
        }
    }

    async fn cache_put<T: Serialize>(&self, key: &str, value: Option<&T>) {
        let (raw, ttl) = match value {
            Some(value) => match serde_json::to_string(value) {
                Ok(raw) => (raw, self.options.ttl),
                Err(e) => {
                    tracing::warn!(key, error = %e, "could not encode value for cache");
                    return;
                }
            },
            None => (PLACEHOLDER.to_string(), self.options.not_found_ttl),
        };

        if let Err(e) = self.cache.set(key, &raw, jittered(ttl)).await {
            bump(&self.counters.cache_errors);
            tracing::warn!(key, error = %e, "cache set failed");
        }
    }

    /// Armed invalidation of `keys`, sharing the model's key locks.
    fn pending(&self, keys: Vec<String>) -> Invalidation {
        Invalidation::new(Arc::clone(&self.cache), self.flights.clone(), keys)
    }

    async fn invalidate_now(&self, keys: Vec<String>) {
        self.finish_write(self.pending(keys)).await;
    }

    /// Run a write's invalidation; `run` holds the keys' locks while deleting.
    async fn finish_write(&self, pending: Invalidation) {
        let keys = pending.keys().to_vec();
        match pending.run().await {
            Ok(()) => tracing::debug!(keys = ?keys, "invalidated"),
            Err(e) => {
                bump(&self.counters.cache_errors);
                tracing::warn!(keys = ?keys, error = %e, "cache invalidation failed; entries will expire");
            }
        }
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Option<E>, Error> {
        let queries = Arc::clone(&self.queries);
        bump(&self.counters.db_queries);
        self.pool
            .conn()
            .call(move |conn| -> Result<Option<E>, Error> {
                let mut stmt = conn.prepare_cached(&queries.select_by_id)?;
                let result = stmt.query_row(params![id], E::from_row);
                optional(result)
            })
            .await
            .map_err(Error::from)
    }

    async fn fetch_by_unique(&self, value: String) -> Result<Option<E>, Error> {
        let queries = Arc::clone(&self.queries);
        bump(&self.counters.db_queries);
        self.pool
            .conn()
            .call(move |conn| -> Result<Option<E>, Error> {
                let mut stmt = conn.prepare_cached(&queries.select_by_unique)?;
                let result = stmt.query_row(params![value], E::from_row);
                optional(result)
            })
            .await
            .map_err(Error::from)
    }

    async fn fetch_id_by_unique(&self, value: String) -> Result<Option<i64>, Error> {
        let queries = Arc::clone(&self.queries);
        bump(&self.counters.db_queries);
        self.pool
            .conn()
            .call(move |conn| -> Result<Option<i64>, Error> {
                let mut stmt = conn.prepare_cached(&queries.select_id_by_unique)?;
                let result = stmt.query_row(params![value], |row| row.get(0));
                optional(result)
            })
            .await
            .map_err(Error::from)
    }
}

fn select_unique(conn: &rusqlite::Connection, queries: &Queries, id: i64) -> Result<Option<String>, Error> {
    let mut stmt = conn.prepare_cached(&queries.select_unique_by_id)?;
    let result = stmt.query_row(params![id], |row| row.get(0));
    optional(result)
}

fn optional<T>(result: rusqlite::Result<T>) -> Result<Option<T>, Error> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn jittered(ttl: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(1.0 - EXPIRY_DEVIATION..=1.0 + EXPIRY_DEVIATION);
    ttl.mul_f64(factor)
}
