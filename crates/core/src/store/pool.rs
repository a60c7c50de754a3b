//! A fixed set of SQLite connections over one database file.
//!
//! Every connection gets WAL mode and a busy timeout, so a writer waits for
//! the file lock instead of failing at once. Migrations run on the first
//! connection before the pool is handed out. Callers get connections
//! round-robin; each one runs its statements on its own background thread.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::migrations::{self, Migrations};
use crate::Error;
use crate::config::AppConfig;
use tokio_rusqlite::Connection;

/// Pool sizing and lock-wait settings.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub size: usize,
    pub busy_timeout: Duration,
    pub migrations: Migrations,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self { size: 4, busy_timeout: Duration::from_secs(5), migrations: migrations::STORE }
    }
}

impl From<&AppConfig> for PoolOptions {
    fn from(config: &AppConfig) -> Self {
        Self { size: config.pool_size, busy_timeout: config.busy_timeout(), ..Default::default() }
    }
}

/// Shared handle to a set of connections on one database.
///
/// Cloning is cheap; all clones hand out the same connections.
#[derive(Clone, Debug)]
pub struct SqlPool {
    conns: Arc<[Connection]>,
    next: Arc<AtomicUsize>,
}

impl SqlPool {
    /// Open `options.size` connections to the database at `path`.
    ///
    /// Creates the file if it doesn't exist, applies pragmas on every
    /// connection and runs pending migrations once.
    pub async fn open(path: impl AsRef<Path>, options: PoolOptions) -> Result<Self, Error> {
        if options.size == 0 {
            return Err(Error::InvalidInput("pool size must be greater than 0".into()));
        }

        let path = path.as_ref().to_path_buf();
        let mut conns = Vec::with_capacity(options.size);
        for _ in 0..options.size {
            let conn = Connection::open(&path).await.map_err(|e| Error::Database(e.into()))?;
            apply_pragmas(&conn, options.busy_timeout).await?;
            conns.push(conn);
        }

        migrations::run(&conns[0], options.migrations).await?;

        tracing::info!(path = %path.display(), size = options.size, "opened connection pool");

        Ok(Self { conns: conns.into(), next: Arc::new(AtomicUsize::new(0)) })
    }

    /// Open an in-memory database for testing.
    ///
    /// An in-memory database is private to its connection, so the pool
    /// holds exactly one.
    pub async fn open_in_memory() -> Result<Self, Error> {
        Self::open_in_memory_with(migrations::STORE).await
    }

    pub(crate) async fn open_in_memory_with(migrations: Migrations) -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;

        apply_pragmas(&conn, PoolOptions::default().busy_timeout).await?;
        migrations::run(&conn, migrations).await?;

        Ok(Self { conns: Arc::from(vec![conn]), next: Arc::new(AtomicUsize::new(0)) })
    }

    /// Next connection in round-robin order.
    pub fn conn(&self) -> &Connection {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.conns.len();
        &self.conns[i]
    }

    pub fn size(&self) -> usize {
        self.conns.len()
    }
}

async fn apply_pragmas(conn: &Connection, busy_timeout: Duration) -> Result<(), Error> {
    conn.call(move |conn| {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;
             PRAGMA foreign_keys=ON;",
        )?;
        conn.busy_timeout(busy_timeout)?;
        Ok(())
    })
    .await
    .map_err(Error::Database)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let pool = SqlPool::open_in_memory().await.unwrap();
        let version = pool
            .conn()
            .call(|conn| conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0)))
            .await
            .unwrap();
        assert!(!version.is_empty());
        assert_eq!(pool.size(), 1);
    }

    #[tokio::test]
    async fn test_open_file_pool_shares_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite");
        let pool = SqlPool::open(&path, PoolOptions { size: 3, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(pool.size(), 3);

        pool.conn()
            .call(|conn| {
                conn.execute("INSERT INTO book (isbn, title) VALUES ('isbn-1', 'Dune')", [])?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(())
            })
            .await
            .unwrap();

        for _ in 0..3 {
            let count: i64 = pool
                .conn()
                .call(|conn| conn.query_row("SELECT COUNT(*) FROM book", [], |row| row.get(0)))
                .await
                .unwrap();
            assert_eq!(count, 1);
        }
    }

    #[tokio::test]
    async fn test_open_rejects_empty_pool() {
        let dir = tempfile::tempdir().unwrap();
        let result = SqlPool::open(dir.path().join("x.sqlite"), PoolOptions { size: 0, ..Default::default() }).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
