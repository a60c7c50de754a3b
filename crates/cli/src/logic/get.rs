//! get implementation.
//!
//! Retrieves a book by primary key.

use bookstore_core::{Book, BookModel};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Parameters for get.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRequest {
    pub id: i64,
}

/// Output from get.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetResponse {
    pub book: Book,
}

/// Implementation of get.
pub async fn get_impl(model: &BookModel, req: GetRequest) -> Result<GetResponse, ServiceError> {
    let book = model
        .find_one(req.id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("book {}", req.id)))?;

    Ok(GetResponse { book })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svc::ServiceContext;

    #[tokio::test]
    async fn test_get_missing() {
        let ctx = ServiceContext::in_memory().await;
        let result = get_impl(&ctx.model, GetRequest { id: 42 }).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_found() {
        let ctx = ServiceContext::in_memory().await;
        let id = ctx.model.insert(&Book::new("isbn-1", "Dune", "Frank Herbert", 1099)).await.unwrap();

        let response = get_impl(&ctx.model, GetRequest { id }).await.unwrap();
        assert_eq!(response.book.title, "Dune");
        assert_eq!(response.book.id, Some(id));
    }
}
