//! Cache clients used by the model.
//!
//! The model treats the cache as an accelerator, never as a source of truth.
//! Backends:
//!
//! - `MemoryCache`: process-local map with per-entry expiry
//! - `SqliteCache`: key/value table in its own SQLite file, shareable across processes
//!
//! Keys are built from the tagged `CacheKey` type so that primary and
//! secondary lookups can never collide.

pub mod client;
pub mod key;
pub mod memory;
pub mod sqlite;

pub use client::{CacheClient, from_config};
pub use key::CacheKey;
pub use memory::MemoryCache;
pub use sqlite::SqliteCache;
