//! File-backed tier: one JSON record per key
//!
//! The medium-term tier. Each key maps to `<sha256(key)>.json` inside the
//! tier directory, so any key (slashes, unicode, very long) gets a stable,
//! collision-free file name. The tier never evicts; capacity management is
//! left to whoever compacts the directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, info, trace, warn};

use crate::cache::entry::CacheEntry;
use crate::cache::tier::KeyValueTier;
use crate::cache::types::{CacheValue, TierName, TierStats};
use crate::clock::SharedClock;
use crate::error::{CacheError, Result};
use crate::persist::{read_json, write_json_atomic};

const RECORD_EXTENSION: &str = "json";

/// Durable tier storing each key in its own file
pub struct FileTier {
    dir: PathBuf,
    clock: SharedClock,
    /// Serializes the read-modify-write around each record; the rename in
    /// `write_json_atomic` provides the write atomicity itself
    stats: Mutex<TierStats>,
}

impl FileTier {
    /// Open (creating if needed) a tier rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>, clock: SharedClock) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;
        info!("Opened file-backed tier at {:?}", dir);

        Ok(Self {
            dir,
            clock,
            stats: Mutex::new(TierStats::default()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Storage location for `key`
    pub fn record_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir
            .join(format!("{}.{}", hex::encode(digest), RECORD_EXTENSION))
    }

    pub fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        let mut stats = self.stats.lock()?;
        let entry = self.read_entry(key)?;
        stats.record_lookup(entry.is_some());

        match entry {
            Some(entry) => {
                debug!("Cache hit (medium_term): {}", key);
                Ok(Some(entry.value))
            }
            None => {
                debug!("Cache miss (medium_term): {}", key);
                Ok(None)
            }
        }
    }

    /// Full stored record for `key`
    pub fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let _stats = self.stats.lock()?;
        self.read_entry(key)
    }

    /// Last-write-wins store of `value` under `key`
    pub fn set(&self, key: &str, value: CacheValue) -> Result<()> {
        let mut stats = self.stats.lock()?;
        let entry = CacheEntry::new(key.to_string(), value, self.clock.now());
        write_json_atomic(&self.record_path(key), &entry)?;
        stats.writes += 1;
        debug!("Stored medium_term record: {}", key);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let _stats = self.stats.lock()?;
        let path = self.record_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    pub fn contains_key(&self, key: &str) -> Result<bool> {
        let _stats = self.stats.lock()?;
        Ok(self.record_path(key).is_file())
    }

    /// Number of records on disk
    pub fn len(&self) -> Result<usize> {
        let _stats = self.stats.lock()?;
        Ok(self.record_paths()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Delete every record in the tier directory
    pub fn clear(&self) -> Result<usize> {
        let _stats = self.stats.lock()?;
        let paths = self.record_paths()?;
        for path in &paths {
            fs::remove_file(path).map_err(|e| CacheError::io(path, e))?;
        }
        info!("Cleared {} medium_term records", paths.len());
        Ok(paths.len())
    }

    pub fn stats(&self) -> Result<TierStats> {
        let mut stats = self.stats.lock()?.clone();
        stats.entries = self.len()?;
        Ok(stats)
    }

    fn read_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.record_path(key);
        let Some(entry) = read_json::<CacheEntry>(&path)? else {
            return Ok(None);
        };

        if entry.key != key {
            warn!("Record {:?} holds key {:?}, expected {:?}", path, entry.key, key);
            return Err(CacheError::StorageError(format!(
                "record {:?} does not belong to key {:?}",
                path, key
            )));
        }

        Ok(Some(entry))
    }

    fn record_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let read_dir = fs::read_dir(&self.dir).map_err(|e| CacheError::io(&self.dir, e))?;

        for entry in read_dir {
            let path = entry.map_err(|e| CacheError::io(&self.dir, e))?.path();
            let is_record = path.extension().is_some_and(|e| e == RECORD_EXTENSION)
                && !path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.'));
            if is_record {
                paths.push(path);
            }
        }

        Ok(paths)
    }
}

impl KeyValueTier for FileTier {
    fn name(&self) -> TierName {
        TierName::MediumTerm
    }

    fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        FileTier::get(self, key)
    }

    fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> Result<()> {
        if let Some(ttl) = ttl {
            trace!("medium_term ignores ttl {:?} for {}", ttl, key);
        }
        FileTier::set(self, key, value)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        FileTier::remove(self, key)
    }

    fn stats(&self) -> Result<TierStats> {
        FileTier::stats(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn open_tier(tmp: &TempDir) -> FileTier {
        FileTier::open(tmp.path().join("medium_term"), Arc::new(SystemClock)).unwrap()
    }

    #[test]
    fn test_set_then_get() {
        let tmp = TempDir::new().unwrap();
        let tier = open_tier(&tmp);

        let value = json!({"suggestions": ["use a set"], "errors": []});
        tier.set("analysis_src/main.py", value.clone()).unwrap();

        assert_eq!(tier.get("analysis_src/main.py").unwrap(), Some(value));
        assert_eq!(tier.get("missing").unwrap(), None);
    }

    #[test]
    fn test_record_path_is_stable_and_flat() {
        let tmp = TempDir::new().unwrap();
        let tier = open_tier(&tmp);

        let a = tier.record_path("../../etc/passwd");
        assert_eq!(a, tier.record_path("../../etc/passwd"));
        assert_eq!(a.parent().unwrap(), tier.dir());
        assert_ne!(a, tier.record_path("../../etc/passwd2"));
    }

    #[test]
    fn test_last_write_wins() {
        let tmp = TempDir::new().unwrap();
        let tier = open_tier(&tmp);

        tier.set("k", json!(1)).unwrap();
        tier.set("k", json!(2)).unwrap();
        assert_eq!(tier.get("k").unwrap(), Some(json!(2)));
        assert_eq!(tier.len().unwrap(), 1);

        let entry = tier.get_entry("k").unwrap().unwrap();
        assert_eq!(entry.key, "k");
        assert_eq!(entry.value, json!(2));
        assert!(tier.get_entry("missing").unwrap().is_none());
    }

    #[test]
    fn test_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        open_tier(&tmp).set("k", json!("persisted")).unwrap();

        let reopened = open_tier(&tmp);
        assert_eq!(reopened.get("k").unwrap(), Some(json!("persisted")));
    }

    #[test]
    fn test_corrupt_record_is_storage_failure() {
        let tmp = TempDir::new().unwrap();
        let tier = open_tier(&tmp);
        fs::write(tier.record_path("k"), b"not json").unwrap();

        let err = tier.get("k").unwrap_err();
        assert!(err.is_storage_failure());
    }

    #[test]
    fn test_remove_and_clear() {
        let tmp = TempDir::new().unwrap();
        let tier = open_tier(&tmp);

        tier.set("a", json!(1)).unwrap();
        tier.set("b", json!(2)).unwrap();
        assert!(tier.remove("a").unwrap());
        assert!(!tier.remove("a").unwrap());
        assert!(!tier.contains_key("a").unwrap());

        assert_eq!(tier.clear().unwrap(), 1);
        assert!(tier.is_empty().unwrap());
    }
}
