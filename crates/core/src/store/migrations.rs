//! Versioned schema setup.
//!
//! A `_migrations` table records the highest applied version. Each database
//! (the book store and the sqlite cache) carries its own ordered list, and a
//! batch and its version row commit in one transaction.

use crate::Error;
use tokio_rusqlite::{Connection, params};

/// Ordered `(version, sql)` batches. Versions start at 1 and increase.
pub type Migrations = &'static [(i64, &'static str)];

/// Schema of the relational store.
pub const STORE: Migrations = &[(1, include_str!("../../migrations/store/001_book.sql"))];

/// Schema of the sqlite cache backend.
pub const CACHE: Migrations = &[(1, include_str!("../../migrations/cache/001_cache_entries.sql"))];

/// Apply every batch newer than the recorded version.
///
/// # Errors
///
/// `Error::MigrationFailed` naming the version whose SQL was rejected.
/// Earlier versions stay applied.
pub async fn run(conn: &Connection, migrations: Migrations) -> Result<(), Error> {
    conn.call(move |conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );",
        )?;
        let applied: i64 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        for &(version, sql) in migrations.iter().filter(|(version, _)| *version > applied) {
            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(sql).map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version, "applied migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_exists(conn: &Connection, name: &'static str) -> bool {
        conn.call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
                params![name],
                |row| row.get(0),
            )
        })
        .await
        .unwrap()
    }

    async fn applied(conn: &Connection) -> i64 {
        conn.call(|conn| conn.query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn, STORE).await.unwrap();
        run(&conn, STORE).await.unwrap();
        assert_eq!(applied(&conn).await, 1);

        assert!(table_exists(&conn, "book").await);
        assert!(!table_exists(&conn, "cache_entries").await);
    }

    #[tokio::test]
    async fn test_migrations_version_tracking() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn, CACHE).await.unwrap();

        assert_eq!(applied(&conn).await, CACHE.len() as i64);
        assert!(table_exists(&conn, "cache_entries").await);
    }

    #[tokio::test]
    async fn test_failed_migration_reports_version() {
        const BROKEN: Migrations = &[(1, "CREATE TABLE ok (id INTEGER);"), (2, "NOT SQL AT ALL;")];
        let conn = Connection::open_in_memory().await.unwrap();

        let err = run(&conn, BROKEN).await.unwrap_err();
        assert!(matches!(err, Error::MigrationFailed(msg) if msg.contains("version 2")));

        assert_eq!(applied(&conn).await, 1);
        assert!(table_exists(&conn, "ok").await);
    }
}
