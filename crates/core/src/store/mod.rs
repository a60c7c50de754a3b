//! Relational store access.
//!
//! A small pool of tokio-rusqlite connections plus the versioned schema
//! migrations applied when the pool opens.

pub mod migrations;
pub mod pool;

pub use pool::{PoolOptions, SqlPool};
