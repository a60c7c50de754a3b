//! purge implementation.
//!
//! Removes expired cache entries. The sqlite backend keeps expired rows,
//! not-found placeholders included, until this runs.

use bookstore_core::CacheClient;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Output from purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeResponse {
    /// Number of entries deleted.
    pub deleted: u64,
}

/// Implementation of purge.
pub async fn purge_impl(cache: &dyn CacheClient) -> Result<PurgeResponse, ServiceError> {
    let deleted = cache.purge_expired().await?;
    tracing::info!(deleted, "purged expired cache entries");
    Ok(PurgeResponse { deleted })
}
