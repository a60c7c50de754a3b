//! Core types for the bookstore.
//!
//! This crate provides:
//! - Cache-aside model over a single SQLite table (`BookModel`)
//! - Cache clients with in-memory and SQLite backends
//! - Connection pool and schema migrations
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod store;

pub use cache::{CacheClient, CacheKey, MemoryCache, SqliteCache};
pub use config::{AppConfig, ConfigError};
pub use error::{ConstraintKind, Error};
pub use model::{Book, BookModel, CachedModel, Entity, ModelOptions, ModelStats};
pub use store::SqlPool;

/// Re-exported so that `Entity` implementations can name row and value types.
pub use tokio_rusqlite::rusqlite;
