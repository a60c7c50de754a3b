//! Tagged cache keys.
//!
//! Primary and secondary lookups live in disjoint namespaces:
//!
//! - `cache:{entity}:id:{id}`
//! - `cache:{entity}:{field}:{sha256(value)}`
//!
//! Secondary values are hashed so that arbitrary text cannot contain the
//! separator or grow the key without bound.

use std::fmt;

use sha2::{Digest, Sha256};

const PREFIX: &str = "cache";
const PRIMARY_FIELD: &str = "id";

/// Cache key for one lookup dimension of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Row cached by primary key.
    Primary { entity: &'static str, id: i64 },
    /// Index entry mapping a unique field value to a primary key.
    Unique { entity: &'static str, field: &'static str, value: String },
}

impl CacheKey {
    pub fn primary(entity: &'static str, id: i64) -> Self {
        CacheKey::Primary { entity, id }
    }

    /// # Panics
    ///
    /// Panics in debug builds if `field` is `id`, which would collide with the primary namespace.
    pub fn unique(entity: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        debug_assert_ne!(field, PRIMARY_FIELD, "secondary field must not shadow the primary namespace");
        CacheKey::Unique { entity, field, value: value.into() }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Primary { entity, id } => write!(f, "{PREFIX}:{entity}:{PRIMARY_FIELD}:{id}"),
            CacheKey::Unique { entity, field, value } => {
                write!(f, "{PREFIX}:{entity}:{field}:{}", hash_value(value))
            }
        }
    }
}

/// SHA-256 of a field value, hex encoded.
pub fn hash_value(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}
