//! Storage contracts for run output.
//!
//! Rows go to an append-only, header-addressed [`RowStore`] (one table per
//! sheet tab); run summaries and the auto-runner record go to a
//! [`BlobStore`] of JSON documents. Two implementations ship with the crate:
//! [`LocalStore`] on the filesystem and [`MemoryStore`] for tests.

pub mod local;
pub mod memory;
pub mod schema;

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use local::LocalStore;
pub use memory::MemoryStore;

/// One table row; cells are positional against the table header.
pub type Row = Vec<Value>;

/// A row located by [`RowStore::find_row`].
#[derive(Debug, Clone, PartialEq)]
pub struct FoundRow {
    /// 0-based index among data rows (the header is not counted).
    pub index: usize,
    pub header: Vec<String>,
    pub values: Row,
}

impl FoundRow {
    pub fn get(&self, column: &str) -> Option<&Value> {
        let idx = self.header.iter().position(|h| h == column)?;
        self.values.get(idx)
    }

    /// Cell rendered as text: strings as-is, other scalars via JSON, null/missing as empty.
    pub fn text(&self, column: &str) -> String {
        self.get(column).map(cell_text).unwrap_or_default()
    }
}

/// Text form of a cell used for lookups and prompts.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Append-only tables addressed by header name.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Append rows after the last data row.
    async fn append_rows(&self, table: &str, rows: Vec<Row>) -> Result<(), StoreError>;

    /// All data-row cells of `column`, in row order.
    async fn read_column(&self, table: &str, column: &str) -> Result<Vec<Value>, StoreError>;

    /// First data row whose `column` cell equals `value` as text.
    async fn find_row(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Option<FoundRow>, StoreError>;

    /// Overwrite one cell of the data row at `row`.
    async fn update_cell(
        &self,
        table: &str,
        row: usize,
        column: &str,
        value: Value,
    ) -> Result<(), StoreError>;
}

/// A JSON document with its store-assigned version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Keyed JSON documents.
///
/// Every write bumps the document version, starting at 1.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn read_json(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Unconditional write; last writer wins.
    async fn write_json(&self, key: &str, value: &Value) -> Result<(), StoreError>;

    async fn read_versioned(&self, key: &str) -> Result<Option<Versioned<Value>>, StoreError>;

    /// Conditional write. `expected` is the version last read (`None` when the
    /// key did not exist); a mismatch yields `StoreError::VersionConflict`.
    /// Returns the new version.
    async fn write_versioned(
        &self,
        key: &str,
        value: &Value,
        expected: Option<u64>,
    ) -> Result<u64, StoreError>;
}

/// Reject keys that would escape the store root.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        Err(StoreError::InvalidKey {
            key: key.to_string(),
        })
    } else {
        Ok(())
    }
}

/// Check a conditional write against the current version.
pub(crate) fn check_version(
    key: &str,
    expected: Option<u64>,
    found: Option<u64>,
) -> Result<u64, StoreError> {
    if expected != found {
        return Err(StoreError::VersionConflict {
            key: key.to_string(),
            expected,
            found,
        });
    }
    Ok(found.unwrap_or(0) + 1)
}

/// Position of `column` in `header`.
pub(crate) fn column_index(table: &str, header: &[String], column: &str) -> Result<usize, StoreError> {
    header
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| StoreError::UnknownColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
}
