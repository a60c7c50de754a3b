//! Structured errors for the bookstore services.
//!
//! These carry a status code in the style of RPC status codes so a
//! transport can be bolted on without reclassifying errors.

use bookstore_core::{ConstraintKind, Error};

/// Structured errors returned by the service logic.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Invalid request parameters.
    #[error("INVALID_ARGUMENT: {0}")]
    InvalidArgument(String),

    /// The requested book does not exist.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// The write conflicts with an existing book.
    #[error("ALREADY_EXISTS: {0}")]
    AlreadyExists(String),

    /// The store is unreachable or busy; retrying may succeed.
    #[error("UNAVAILABLE: {0}")]
    Unavailable(String),

    /// Anything else.
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Numeric status code, also used as the process exit code.
    pub fn code(&self) -> u8 {
        match self {
            ServiceError::InvalidArgument(_) => 3,
            ServiceError::NotFound(_) => 5,
            ServiceError::AlreadyExists(_) => 6,
            ServiceError::Internal(_) => 13,
            ServiceError::Unavailable(_) => 14,
        }
    }
}

impl From<Error> for ServiceError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidInput(msg) => ServiceError::InvalidArgument(msg),
            Error::ConstraintViolation { kind: ConstraintKind::Unique, detail } => ServiceError::AlreadyExists(detail),
            Error::ConstraintViolation { detail, .. } => ServiceError::InvalidArgument(detail),
            e @ (Error::Database(_) | Error::Cache(_)) => ServiceError::Unavailable(e.to_string()),
            e => ServiceError::Internal(e.to_string()),
        }
    }
}
