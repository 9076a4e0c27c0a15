//! In-process store for tests and `--ephemeral` sessions.

use super::{
    BlobStore, FoundRow, Row, RowStore, Versioned, cell_text, check_version, column_index,
    schema, validate_key,
};
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Table {
    header: Vec<String>,
    rows: Vec<Row>,
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Table>,
    blobs: HashMap<String, Versioned<Value>>,
}

/// Row and blob store held in memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Data rows of a table, for assertions.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn blob_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().blobs.keys().cloned().collect();
        keys.sort();
        keys
    }
}

fn header_of(inner: &Inner, table: &str) -> Result<Vec<String>, StoreError> {
    if let Some(t) = inner.tables.get(table) {
        return Ok(t.header.clone());
    }
    schema::header_for(table)
        .map(|h| h.iter().map(|c| c.to_string()).collect())
        .ok_or_else(|| StoreError::UnknownTable {
            table: table.to_string(),
        })
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn append_rows(&self, table: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let header = header_of(&inner, table)?;
        let entry = inner.tables.entry(table.to_string()).or_insert_with(|| Table {
            header,
            rows: Vec::new(),
        });
        entry.rows.extend(rows);
        Ok(())
    }

    async fn read_column(&self, table: &str, column: &str) -> Result<Vec<Value>, StoreError> {
        let inner = self.lock();
        let header = header_of(&inner, table)?;
        let idx = column_index(table, &header, column)?;
        Ok(inner
            .tables
            .get(table)
            .map(|t| {
                t.rows
                    .iter()
                    .map(|r| r.get(idx).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_row(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Option<FoundRow>, StoreError> {
        let inner = self.lock();
        let header = header_of(&inner, table)?;
        let idx = column_index(table, &header, column)?;
        let Some(t) = inner.tables.get(table) else {
            return Ok(None);
        };
        Ok(t.rows
            .iter()
            .position(|r| r.get(idx).map(cell_text).as_deref() == Some(value))
            .map(|index| FoundRow {
                index,
                header,
                values: t.rows[index].clone(),
            }))
    }

    async fn update_cell(
        &self,
        table: &str,
        row: usize,
        column: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let header = header_of(&inner, table)?;
        let idx = column_index(table, &header, column)?;
        let target = inner
            .tables
            .get_mut(table)
            .and_then(|t| t.rows.get_mut(row))
            .ok_or_else(|| StoreError::RowOutOfRange {
                table: table.to_string(),
                row,
            })?;
        if target.len() <= idx {
            target.resize(idx + 1, Value::Null);
        }
        target[idx] = value;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn read_json(&self, key: &str) -> Result<Option<Value>, StoreError> {
        validate_key(key)?;
        Ok(self.lock().blobs.get(key).map(|v| v.value.clone()))
    }

    async fn write_json(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut inner = self.lock();
        let version = inner.blobs.get(key).map_or(0, |v| v.version) + 1;
        inner.blobs.insert(
            key.to_string(),
            Versioned {
                version,
                value: value.clone(),
            },
        );
        Ok(())
    }

    async fn read_versioned(&self, key: &str) -> Result<Option<Versioned<Value>>, StoreError> {
        validate_key(key)?;
        Ok(self.lock().blobs.get(key).cloned())
    }

    async fn write_versioned(
        &self,
        key: &str,
        value: &Value,
        expected: Option<u64>,
    ) -> Result<u64, StoreError> {
        validate_key(key)?;
        let mut inner = self.lock();
        let found = inner.blobs.get(key).map(|v| v.version);
        let version = check_version(key, expected, found)?;
        inner.blobs.insert(
            key.to_string(),
            Versioned {
                version,
                value: value.clone(),
            },
        );
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_rows_roundtrip() {
        let store = MemoryStore::new();
        store
            .append_rows(schema::SOURCES, vec![vec![json!("R1"), json!("d"), json!("ES"), json!(1), json!("https://a.com")]])
            .await
            .unwrap();
        let urls = store.read_column(schema::SOURCES, "source_url").await.unwrap();
        assert_eq!(urls, vec![json!("https://a.com")]);
        // Short rows read as null for missing cells.
        let notes = store.read_column(schema::SOURCES, "note").await.unwrap();
        assert_eq!(notes, vec![Value::Null]);
    }

    #[tokio::test]
    async fn test_update_extends_short_row() {
        let store = MemoryStore::new();
        store
            .append_rows(schema::SOURCES, vec![vec![json!("R1")]])
            .await
            .unwrap();
        store
            .update_cell(schema::SOURCES, 0, "note", json!("checked"))
            .await
            .unwrap();
        let found = store.find_row(schema::SOURCES, "run_id", "R1").await.unwrap().unwrap();
        assert_eq!(found.text("note"), "checked");
    }

    #[tokio::test]
    async fn test_versioned_conflict() {
        let store = MemoryStore::new();
        assert_eq!(store.write_versioned("k.json", &json!(1), None).await.unwrap(), 1);
        assert!(store.write_versioned("k.json", &json!(2), Some(2)).await.is_err());
        assert_eq!(store.write_versioned("k.json", &json!(2), Some(1)).await.unwrap(), 2);
        assert_eq!(store.read_json("k.json").await.unwrap(), Some(json!(2)));
        assert_eq!(store.blob_keys(), vec!["k.json".to_string()]);
    }
}
