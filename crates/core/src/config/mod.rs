//! Bookstore settings, merged by figment from (highest first):
//!
//! 1. `BOOKSTORE_*` environment variables; `__` separates nested keys, so
//!    `BOOKSTORE_CACHE__TTL_SECS` sets `cache.ttl_secs`
//! 2. a TOML file, given explicitly or through `BOOKSTORE_CONFIG_FILE`
//! 3. the defaults below

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Where the store lives and how the book model caches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database holding the book table.
    ///
    /// Set via BOOKSTORE_DATA_SOURCE environment variable.
    #[serde(default = "default_data_source")]
    pub data_source: PathBuf,

    /// Table the book model reads and writes.
    ///
    /// Set via BOOKSTORE_TABLE environment variable.
    #[serde(default = "default_table")]
    pub table: String,

    /// Number of connections kept open against `data_source`.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// How long a connection waits on a locked database, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Cache backend settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Which cache backend fronts the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// Process-local map.
    Memory,
    /// Key/value table in a separate SQLite file, shareable across processes.
    Sqlite,
}

/// Cache backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_backend")]
    pub backend: CacheBackendKind,

    /// Database file for the sqlite backend.
    ///
    /// Set via BOOKSTORE_CACHE__PATH environment variable.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Expiry for cached rows and index entries.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Expiry for not-found placeholders.
    #[serde(default = "default_not_found_ttl_secs")]
    pub not_found_ttl_secs: u64,

    /// Upper bound on entries held by the memory backend.
    #[serde(default)]
    pub max_entries: Option<usize>,
}

fn default_data_source() -> PathBuf {
    PathBuf::from("./bookstore.sqlite")
}

fn default_table() -> String {
    "book".into()
}

fn default_pool_size() -> usize {
    4
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_backend() -> CacheBackendKind {
    CacheBackendKind::Memory
}

fn default_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_not_found_ttl_secs() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
            ttl_secs: default_ttl_secs(),
            not_found_ttl_secs: default_not_found_ttl_secs(),
            max_entries: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn not_found_ttl(&self) -> Duration {
        Duration::from_secs(self.not_found_ttl_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_source: default_data_source(),
            table: default_table(),
            pool_size: default_pool_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
            cache: CacheConfig::default(),
        }
    }
}

impl AppConfig {
    /// Busy timeout as Duration.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// The TOML file comes from `BOOKSTORE_CONFIG_FILE` when set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed,
    /// or if validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("BOOKSTORE_CONFIG_FILE").ok().map(PathBuf::from);
        Self::load_from(file.as_deref())
    }

    /// Load configuration using an explicit TOML file instead of `BOOKSTORE_CONFIG_FILE`.
    pub fn load_from(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(
            Env::prefixed("BOOKSTORE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Path of the sqlite cache database.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the sqlite backend is selected without a path.
    pub fn require_cache_path(&self) -> Result<&Path, ConfigError> {
        self.cache.path.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "cache.path".into(),
            hint: "Set BOOKSTORE_CACHE__PATH environment variable".into(),
        })
    }
}
