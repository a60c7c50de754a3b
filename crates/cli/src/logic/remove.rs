//! remove implementation.
//!
//! Deletes a book by primary key.

use bookstore_core::BookModel;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Parameters for remove.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveRequest {
    pub id: i64,
}

/// Output from remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveResponse {
    pub removed: bool,
}

/// Implementation of remove.
pub async fn remove_impl(model: &BookModel, req: RemoveRequest) -> Result<RemoveResponse, ServiceError> {
    let removed = model.delete(req.id).await?;
    Ok(RemoveResponse { removed })
}
