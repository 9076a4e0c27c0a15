//! Filesystem helpers shared by the local store: atomic writes, JSON
//! documents and JSON-lines tables.

use std::fs::OpenOptions;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write JSON data to a file.
///
/// Serializes `data` to pretty-printed JSON, writes it to a uniquely named
/// temp file in the target directory, then renames over the target path.
/// Creates parent directories if needed.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(data).map_err(io::Error::other)?;
    atomic_write(path, json.as_bytes())
}

/// Atomically write raw bytes to a file.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Load and deserialize JSON from a file.
///
/// Returns `Ok(None)` if the file doesn't exist.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    let value =
        serde_json::from_str(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(value))
}

/// Append one JSON document per line to a JSON-lines file.
pub fn append_json_lines<T: serde::Serialize>(path: &Path, records: &[T]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut buf = String::new();
    for record in records {
        buf.push_str(&serde_json::to_string(record).map_err(io::Error::other)?);
        buf.push('\n');
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(buf.as_bytes())?;
    file.flush()
}

/// Read every non-empty line of a JSON-lines file.
///
/// Returns an empty list if the file doesn't exist. A line that fails to
/// parse is reported with its 1-based line number.
pub fn read_json_lines<T: serde::de::DeserializeOwned>(path: &Path) -> io::Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line {}: {}", idx + 1, e),
            )
        })?;
        out.push(value);
    }
    Ok(out)
}

/// Rewrite a JSON-lines file in full, atomically.
pub fn rewrite_json_lines<T: serde::Serialize>(path: &Path, records: &[T]) -> io::Result<()> {
    let mut buf = String::new();
    for record in records {
        buf.push_str(&serde_json::to_string(record).map_err(io::Error::other)?);
        buf.push('\n');
    }
    atomic_write(path, buf.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Marker {
        name: String,
        count: u32,
    }

    #[test]
    fn test_atomic_write_json_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let data = Marker {
            name: "runner".into(),
            count: 7,
        };
        atomic_write_json(&path, &data).unwrap();
        let loaded: Option<Marker> = load_json(&path).unwrap();
        assert_eq!(loaded, Some(data));
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs_and_no_tmp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runs").join("RUN_1").join("summary.json");
        atomic_write_json(&path, &"ok").unwrap();
        assert!(path.exists());
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("summary.json")]);
    }

    #[test]
    fn test_atomic_write_leaves_tmp_named_sibling_alone() {
        let dir = TempDir::new().unwrap();
        let sibling = dir.path().join("x.tmp");
        std::fs::write(&sibling, "keep").unwrap();
        atomic_write(&dir.path().join("x.json"), b"{}").unwrap();
        assert_eq!(std::fs::read_to_string(&sibling).unwrap(), "keep");
    }

    #[test]
    fn test_load_json_nonexistent() {
        let result: io::Result<Option<Marker>> = load_json(Path::new("/nonexistent/file.json"));
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_json_lines_append_and_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Ideas.jsonl");
        append_json_lines(&path, &[vec!["run_id", "name"]]).unwrap();
        append_json_lines(&path, &[vec!["RUN_1", "a"], vec!["RUN_1", "b"]]).unwrap();

        let rows: Vec<Vec<String>> = read_json_lines(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], vec!["RUN_1".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_json_lines_reports_bad_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jsonl");
        std::fs::write(&path, "[1]\nnot json\n").unwrap();
        let err = read_json_lines::<Vec<u32>>(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_rewrite_json_lines_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.jsonl");
        append_json_lines(&path, &[1, 2, 3]).unwrap();
        rewrite_json_lines(&path, &[9]).unwrap();
        let rows: Vec<u32> = read_json_lines(&path).unwrap();
        assert_eq!(rows, vec![9]);
    }
}
