//! JSON file helpers shared by the file-backed tier, ledgers and the
//! knowledge base

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{CacheError, Result};

/// Read and decode a JSON file, `None` if it does not exist.
///
/// A file that exists but does not decode is corrupt durable state and is
/// reported as a storage failure.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CacheError::io(path, e)),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| CacheError::StorageError(format!("corrupt record {:?}: {}", path, e)))
}

/// Encode `value` and atomically replace `path` with it.
///
/// Writes to a uniquely named sibling then renames, so readers see either
/// the old or the new record, never a partial one.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;

    let dir = path
        .parent()
        .ok_or_else(|| CacheError::StorageError(format!("no parent directory for {:?}", path)))?;
    fs::create_dir_all(dir).map_err(|e| CacheError::io(dir, e))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("record");
    let tmp_path = dir.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

    let result = (|| {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(CacheError::io(path, e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        let read: Option<Value> = read_json(&tmp.path().join("absent.json")).unwrap();
        assert!(read.is_none());
    }

    #[test]
    fn test_write_then_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("record.json");

        write_json_atomic(&path, &json!({"a": [1, 2, 3]})).unwrap();
        let read: Option<Value> = read_json(&path).unwrap();
        assert_eq!(read, Some(json!({"a": [1, 2, 3]})));

        // No temp files left behind
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_corrupt_file_is_storage_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        fs::write(&path, b"{ truncated").unwrap();

        let err = read_json::<Value>(&path).unwrap_err();
        assert!(err.is_storage_failure());
    }
}
