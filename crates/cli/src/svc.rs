//! Service context shared by every request handler.

use std::sync::Arc;

use bookstore_core::store::PoolOptions;
use bookstore_core::{AppConfig, BookModel, CacheClient, Error, ModelOptions, SqlPool, cache};

/// Long-lived handles built once per process.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub config: AppConfig,
    pub model: Arc<BookModel>,
    /// The model's cache, for maintenance.
    pub cache: Arc<dyn CacheClient>,
}

impl ServiceContext {
    /// Open the store and cache described by `config` and build the book model.
    ///
    /// Fails immediately if the data source cannot be opened or the table is missing.
    pub async fn new(config: AppConfig) -> Result<Self, Error> {
        let pool = SqlPool::open(&config.data_source, PoolOptions::from(&config)).await?;
        let cache = cache::from_config(&config.cache).await?;
        let model =
            BookModel::new(pool, Arc::clone(&cache), &config.table, ModelOptions::from(&config.cache)).await?;

        Ok(Self { config, model: Arc::new(model), cache })
    }

    /// Context over an in-memory store and memory cache, for tests.
    #[cfg(test)]
    pub async fn in_memory() -> Self {
        let config = AppConfig::default();
        let pool = SqlPool::open_in_memory().await.unwrap();
        let cache = cache::from_config(&config.cache).await.unwrap();
        let model = BookModel::new(pool, Arc::clone(&cache), &config.table, ModelOptions::from(&config.cache))
            .await
            .unwrap();
        Self { config, model: Arc::new(model), cache }
    }
}
