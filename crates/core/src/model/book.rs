//! The book entity.

use serde::{Deserialize, Serialize};
use tokio_rusqlite::rusqlite::{self, Row, types::Value};

use super::{CachedModel, Entity};
use crate::Error;

/// A book record. `price` is in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: Option<i64>,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub price: i64,
}

impl Book {
    /// A book not yet stored.
    pub fn new(isbn: impl Into<String>, title: impl Into<String>, author: impl Into<String>, price: i64) -> Self {
        Self { id: None, isbn: isbn.into(), title: title.into(), author: author.into(), price }
    }
}

impl Entity for Book {
    const NAME: &'static str = "book";
    const COLUMNS: &'static [&'static str] = &["isbn", "title", "author", "price"];
    const UNIQUE: &'static str = "isbn";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn with_id(self, id: i64) -> Self {
        Self { id: Some(id), ..self }
    }

    fn unique_value(&self) -> &str {
        &self.isbn
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.isbn.clone()),
            Value::Text(self.title.clone()),
            Value::Text(self.author.clone()),
            Value::Integer(self.price),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            isbn: row.get(1)?,
            title: row.get(2)?,
            author: row.get(3)?,
            price: row.get(4)?,
        })
    }
}

/// Cached access to the book table.
pub type BookModel = CachedModel<Book>;

impl CachedModel<Book> {
    /// Look up a book by ISBN.
    pub async fn find_one_by_isbn(&self, isbn: &str) -> Result<Option<Book>, Error> {
        self.find_one_by_unique(isbn).await
    }
}
