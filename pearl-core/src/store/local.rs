//! Filesystem store.
//!
//! Layout under the root directory:
//!
//! ```text
//! tables/<Table>.jsonl   first line is the header, one JSON array per row
//! blobs/<key>            {"version": n, "value": ...}
//! .lock                  advisory lock file
//! ```
//!
//! Every operation holds an `fs2` lock on `.lock` (shared for reads,
//! exclusive for writes), so stores opened on the same directory by
//! different processes never interleave a read-modify-write.

use super::{
    BlobStore, FoundRow, Row, RowStore, Versioned, cell_text, check_version, column_index,
    schema, validate_key,
};
use crate::error::StoreError;
use crate::persistence::{append_json_lines, atomic_write_json, load_json, read_json_lines, rewrite_json_lines};
use async_trait::async_trait;
use fs2::FileExt;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

const LOCK_FILE: &str = ".lock";

pub struct LocalStore {
    root: PathBuf,
    /// Serializes callers sharing this instance; the lock file covers the rest.
    lock: Mutex<()>,
}

/// Held for the duration of one store operation. Dropping it closes the lock
/// file, which releases the advisory lock.
struct DirGuard<'a> {
    _local: MutexGuard<'a, ()>,
    _file: File,
}

#[derive(Clone, Copy)]
enum LockMode {
    Shared,
    Exclusive,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_path(&self, table: &str) -> Result<PathBuf, StoreError> {
        validate_key(table)?;
        if table.contains('/') {
            return Err(StoreError::InvalidKey {
                key: table.to_string(),
            });
        }
        Ok(self.root.join("tables").join(format!("{table}.jsonl")))
    }

    fn blob_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join("blobs").join(key))
    }

    /// Header plus data rows; `None` when the table file does not exist yet.
    fn load_table(&self, table: &str) -> Result<Option<(Vec<String>, Vec<Row>)>, StoreError> {
        let path = self.table_path(table)?;
        if !path.exists() {
            return Ok(None);
        }
        let mut lines: Vec<Value> = read_json_lines(&path).map_err(|e| corrupt(&path, e))?;
        if lines.is_empty() {
            return Ok(None);
        }
        let header: Vec<String> = serde_json::from_value(lines.remove(0)).map_err(|e| {
            StoreError::Corrupt {
                location: path.display().to_string(),
                message: format!("header: {e}"),
            }
        })?;
        let rows = lines
            .into_iter()
            .map(|line| match line {
                Value::Array(cells) => cells,
                other => vec![other],
            })
            .collect();
        Ok(Some((header, rows)))
    }

    /// Existing header, or the schema header for a table not yet created.
    fn header_or_schema(&self, table: &str) -> Result<(Vec<String>, Vec<Row>), StoreError> {
        match self.load_table(table)? {
            Some(loaded) => Ok(loaded),
            None => Ok((schema_header(table)?, Vec::new())),
        }
    }

    fn guard(&self, mode: LockMode) -> Result<DirGuard<'_>, StoreError> {
        let local = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        std::fs::create_dir_all(&self.root)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.root.join(LOCK_FILE))?;
        match mode {
            LockMode::Shared => FileExt::lock_shared(&file)?,
            LockMode::Exclusive => FileExt::lock_exclusive(&file)?,
        }
        Ok(DirGuard {
            _local: local,
            _file: file,
        })
    }

    fn load_blob(&self, key: &str) -> Result<Option<Versioned<Value>>, StoreError> {
        let path = self.blob_path(key)?;
        load_json(&path).map_err(|e| corrupt(&path, e))
    }
}

fn schema_header(table: &str) -> Result<Vec<String>, StoreError> {
    schema::header_for(table)
        .map(|h| h.iter().map(|c| c.to_string()).collect())
        .ok_or_else(|| StoreError::UnknownTable {
            table: table.to_string(),
        })
}

fn corrupt(path: &Path, err: io::Error) -> StoreError {
    if err.kind() == io::ErrorKind::InvalidData {
        StoreError::Corrupt {
            location: path.display().to_string(),
            message: err.to_string(),
        }
    } else {
        StoreError::Io(err)
    }
}

#[async_trait]
impl RowStore for LocalStore {
    async fn append_rows(&self, table: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        let _guard = self.guard(LockMode::Exclusive)?;
        let path = self.table_path(table)?;
        if self.load_table(table)?.is_none() {
            let header = schema_header(table)?;
            rewrite_json_lines(&path, &[header])?;
        }
        append_json_lines(&path, &rows)?;
        debug!(table, rows = rows.len(), "Appended rows");
        Ok(())
    }

    async fn read_column(&self, table: &str, column: &str) -> Result<Vec<Value>, StoreError> {
        let _guard = self.guard(LockMode::Shared)?;
        let (header, rows) = self.header_or_schema(table)?;
        let idx = column_index(table, &header, column)?;
        Ok(rows
            .into_iter()
            .map(|mut row| {
                if idx < row.len() {
                    row.swap_remove(idx)
                } else {
                    Value::Null
                }
            })
            .collect())
    }

    async fn find_row(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Option<FoundRow>, StoreError> {
        let _guard = self.guard(LockMode::Shared)?;
        let (header, rows) = self.header_or_schema(table)?;
        let idx = column_index(table, &header, column)?;
        let found = rows
            .into_iter()
            .enumerate()
            .find(|(_, row)| row.get(idx).map(cell_text).as_deref() == Some(value));
        Ok(found.map(|(index, values)| FoundRow {
            index,
            header,
            values,
        }))
    }

    async fn update_cell(
        &self,
        table: &str,
        row: usize,
        column: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        let _guard = self.guard(LockMode::Exclusive)?;
        let (header, mut rows) = self.header_or_schema(table)?;
        let idx = column_index(table, &header, column)?;
        let target = rows.get_mut(row).ok_or_else(|| StoreError::RowOutOfRange {
            table: table.to_string(),
            row,
        })?;
        if target.len() <= idx {
            target.resize(idx + 1, Value::Null);
        }
        target[idx] = value;

        let mut lines: Vec<Value> = Vec::with_capacity(rows.len() + 1);
        lines.push(Value::from(header));
        lines.extend(rows.into_iter().map(Value::Array));
        rewrite_json_lines(&self.table_path(table)?, &lines)?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn read_json(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let _guard = self.guard(LockMode::Shared)?;
        Ok(self.load_blob(key)?.map(|v| v.value))
    }

    async fn write_json(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let _guard = self.guard(LockMode::Exclusive)?;
        let version = self.load_blob(key)?.map_or(0, |v| v.version) + 1;
        let path = self.blob_path(key)?;
        atomic_write_json(
            &path,
            &Versioned {
                version,
                value: value.clone(),
            },
        )?;
        Ok(())
    }

    async fn read_versioned(&self, key: &str) -> Result<Option<Versioned<Value>>, StoreError> {
        let _guard = self.guard(LockMode::Shared)?;
        self.load_blob(key)
    }

    async fn write_versioned(
        &self,
        key: &str,
        value: &Value,
        expected: Option<u64>,
    ) -> Result<u64, StoreError> {
        let _guard = self.guard(LockMode::Exclusive)?;
        let found = self.load_blob(key)?.map(|v| v.version);
        let version = check_version(key, expected, found)?;
        let path = self.blob_path(key)?;
        atomic_write_json(
            &path,
            &Versioned {
                version,
                value: value.clone(),
            },
        )?;
        debug!(key, version, "Versioned write");
        Ok(version)
    }
}
