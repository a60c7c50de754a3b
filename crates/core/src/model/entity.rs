//! Row types the cached model can serve.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_rusqlite::rusqlite::{self, Row, types::Value};

/// A table row with an integer primary key named `id` and one unique
/// secondary column.
///
/// `COLUMNS` lists every non-key column in binding order and must contain
/// `UNIQUE`. `from_row` receives rows selected as `id, COLUMNS...`.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Cache namespace for this entity type.
    const NAME: &'static str;

    /// Non-key columns, in the order `values` produces them.
    const COLUMNS: &'static [&'static str];

    /// Unique secondary column. Must not be `id`.
    const UNIQUE: &'static str;

    /// Primary key, once assigned.
    fn id(&self) -> Option<i64>;

    /// Copy of `self` carrying the assigned primary key.
    fn with_id(self, id: i64) -> Self;

    /// Current value of the unique column.
    fn unique_value(&self) -> &str;

    /// Column values, ordered like `COLUMNS`.
    fn values(&self) -> Vec<Value>;

    /// Map a row selected as `id, COLUMNS...`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Precomputed statements for one entity type on one table.
#[derive(Debug)]
pub(crate) struct Queries {
    pub select_by_id: String,
    pub select_by_unique: String,
    pub select_id_by_unique: String,
    pub select_unique_by_id: String,
    pub insert: String,
    pub update: String,
    pub delete: String,
}

impl Queries {
    /// `table` must already be a validated identifier.
    pub fn new<E: Entity>(table: &str) -> Self {
        let columns = E::COLUMNS.join(", ");
        let placeholders = (1..=E::COLUMNS.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let assignments = E::COLUMNS
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let id_param = E::COLUMNS.len() + 1;
        let unique = E::UNIQUE;

        Self {
            select_by_id: format!("SELECT id, {columns} FROM \"{table}\" WHERE id = ?1"),
            select_by_unique: format!(
                "SELECT id, {columns} FROM \"{table}\" WHERE {unique} = ?1 ORDER BY id LIMIT 1"
            ),
            select_id_by_unique: format!("SELECT id FROM \"{table}\" WHERE {unique} = ?1 ORDER BY id LIMIT 1"),
            select_unique_by_id: format!("SELECT {unique} FROM \"{table}\" WHERE id = ?1"),
            insert: format!("INSERT INTO \"{table}\" ({columns}) VALUES ({placeholders})"),
            update: format!("UPDATE \"{table}\" SET {assignments} WHERE id = ?{id_param}"),
            delete: format!("DELETE FROM \"{table}\" WHERE id = ?1"),
        }
    }
}

/// Whether `name` is a plain SQL identifier safe to splice into statements.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    name.len() <= 64 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
