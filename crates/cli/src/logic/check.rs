//! check implementation.
//!
//! Reports whether a book is stocked and at what price.

use bookstore_core::BookModel;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Parameters for check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    /// ISBN of the book to look up.
    pub isbn: String,
}

/// Output from check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub found: bool,
    /// Price in minor currency units; 0 when not found.
    pub price: i64,
}

/// Implementation of check.
///
/// An unknown ISBN is a normal answer, not an error.
pub async fn check_impl(model: &BookModel, req: CheckRequest) -> Result<CheckResponse, ServiceError> {
    if req.isbn.trim().is_empty() {
        return Err(ServiceError::InvalidArgument("isbn cannot be empty".into()));
    }

    let response = match model.find_one_by_isbn(&req.isbn).await? {
        Some(book) => CheckResponse { found: true, price: book.price },
        None => CheckResponse { found: false, price: 0 },
    };

    tracing::debug!(isbn = %req.isbn, found = response.found, "check");
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svc::ServiceContext;
    use bookstore_core::Book;

    #[tokio::test]
    async fn test_check_found() {
        let ctx = ServiceContext::in_memory().await;
        ctx.model.insert(&Book::new("isbn-1", "Dune", "Frank Herbert", 1099)).await.unwrap();

        let response = check_impl(&ctx.model, CheckRequest { isbn: "isbn-1".into() }).await.unwrap();
        assert_eq!(response, CheckResponse { found: true, price: 1099 });
    }

    #[tokio::test]
    async fn test_check_missing() {
        let ctx = ServiceContext::in_memory().await;
        let response = check_impl(&ctx.model, CheckRequest { isbn: "nope".into() }).await.unwrap();
        assert!(!response.found);
        assert_eq!(response.price, 0);
    }

    #[tokio::test]
    async fn test_check_empty_isbn() {
        let ctx = ServiceContext::in_memory().await;
        let result = check_impl(&ctx.model, CheckRequest { isbn: "  ".into() }).await;
        assert!(matches!(result, Err(ServiceError::InvalidArgument(_))));
    }
}
