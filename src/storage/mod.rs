//! Table persistence: bulk table reads and writes, namespaces and the final
//! constrained commit.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

use serde::Serialize;

use crate::domain::Frame;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Drop any existing table and write the frame as the whole table
    Replace,
    /// Add rows to the existing table, creating it or its missing columns as needed
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub name: String,
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

/// Keys and nullability declared on a table at commit time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableConstraints {
    pub primary_key: Option<String>,
    pub not_null: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
}

/// A table to be replaced in full under its declared constraints
#[derive(Debug, Clone, Copy)]
pub struct ConstrainedTable<'a> {
    pub name: &'a str,
    pub frame: &'a Frame,
    pub constraints: &'a TableConstraints,
}

/// Trait for bulk table persistence
///
/// A `None` namespace addresses the store's default schema.
pub trait TableStore {
    fn write_table(&self, table: &str, namespace: Option<&str>, frame: &Frame, mode: WriteMode) -> Result<()>;

    fn read_table(&self, table: &str, namespace: Option<&str>) -> Result<Frame>;

    fn table_exists(&self, table: &str, namespace: Option<&str>) -> Result<bool>;

    fn create_namespace(&self, namespace: &str) -> Result<()>;

    /// Drop a namespace and every table in it. Dropping a missing namespace is not an error.
    fn drop_namespace(&self, namespace: &str) -> Result<()>;

    /// Add a null-filled column. Returns false when the column already exists.
    fn add_column(&self, table: &str, namespace: Option<&str>, column: &str) -> Result<bool>;

    /// Replace every listed table in one atomic step with its constraints
    /// applied. Tables are created in order, so referenced tables come first.
    /// Nothing is changed when any constraint fails.
    fn commit_constrained(&self, namespace: Option<&str>, tables: &[ConstrainedTable<'_>]) -> Result<()>;

    /// Constraints currently declared on a table
    fn table_constraints(&self, table: &str, namespace: Option<&str>) -> Result<TableConstraints>;
}
