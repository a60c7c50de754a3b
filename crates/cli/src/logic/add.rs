//! add implementation.
//!
//! Stocks a new book.

use bookstore_core::{Book, BookModel};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Parameters for add.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddRequest {
    pub isbn: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    /// Price in minor currency units.
    pub price: i64,
}

/// Output from add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddResponse {
    /// Assigned primary key.
    pub id: i64,
}

/// Implementation of add.
pub async fn add_impl(model: &BookModel, req: AddRequest) -> Result<AddResponse, ServiceError> {
    if req.isbn.trim().is_empty() {
        return Err(ServiceError::InvalidArgument("isbn cannot be empty".into()));
    }
    if req.title.trim().is_empty() {
        return Err(ServiceError::InvalidArgument("title cannot be empty".into()));
    }
    if req.price < 0 {
        return Err(ServiceError::InvalidArgument(format!("price must not be negative: {}", req.price)));
    }

    let id = model.insert(&Book::new(req.isbn, req.title, req.author, req.price)).await?;

    tracing::info!(id, "book added");
    Ok(AddResponse { id })
}
