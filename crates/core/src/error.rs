//! Unified error types for the bookstore.
//!
//! Store failures are split into transient errors (retriable by the caller)
//! and constraint violations (not retriable). Cache failures have their own
//! variant so the model can log and swallow them.

use tokio_rusqlite::rusqlite;

/// Unified error types for the bookstore model and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters or a malformed descriptor.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Database operation failed (connection, busy, I/O).
    #[error("DB_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// A uniqueness, foreign key, or check constraint rejected the write.
    #[error("CONSTRAINT_VIOLATION: {detail}")]
    ConstraintViolation { kind: ConstraintKind, detail: String },

    /// Migration failed to apply.
    #[error("DB_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Cache backend unavailable or misbehaving.
    #[error("CACHE_ERROR: {0}")]
    Cache(String),

    /// A cached or stored value could not be encoded or decoded.
    #[error("CODEC_ERROR: {0}")]
    Codec(String),
}

/// Which kind of constraint rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// A unique index or primary key already holds the value.
    Unique,
    /// CHECK, NOT NULL or foreign key.
    Other,
}

impl Error {
    /// Whether the caller may retry the operation as-is.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Database(_))
    }

    /// Whether the write collided with an existing row.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::ConstraintViolation { kind: ConstraintKind::Unique, .. })
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e.into(),
            other => Error::Database(other),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        let kind = match &err {
            rusqlite::Error::SqliteFailure(failure, _) if failure.code == rusqlite::ErrorCode::ConstraintViolation => {
                match failure.extended_code {
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        Some(ConstraintKind::Unique)
                    }
                    _ => Some(ConstraintKind::Other),
                }
            }
            _ => None,
        };

        match kind {
            Some(kind) => Error::ConstraintViolation { kind, detail: err.to_string() },
            None => Error::Database(tokio_rusqlite::Error::Error(err)),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Codec(err.to_string())
    }
}
