//! Bounded, append-only ledgers for interaction context and execution steps
//!
//! A ledger keeps the last `max_len` entries in insertion order and persists
//! the whole bounded sequence on every append. The context and memory
//! ledgers are independent instances with separate files and limits.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::SharedClock;
use crate::error::{CacheError, Result};
use crate::persist::{read_json, write_json_atomic};

const LEDGER_FILE_VERSION: u32 = 1;

/// Which ledger an instance is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    /// Recent interaction context
    Context,
    /// Execution step memory
    Memory,
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerKind::Context => write!(f, "context"),
            LedgerKind::Memory => write!(f, "memory"),
        }
    }
}

/// One timestamped ledger record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// On-disk form of a ledger
#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    version: u32,
    kind: LedgerKind,
    entries: Vec<LedgerEntry>,
}

/// Bounded, time-ordered log
pub struct Ledger {
    kind: LedgerKind,
    max_len: usize,
    path: Option<PathBuf>,
    clock: SharedClock,
    entries: Mutex<VecDeque<LedgerEntry>>,
}

impl Ledger {
    /// Open a ledger persisted at `path`, reloading any saved entries.
    ///
    /// Saved entries beyond `max_len` are dropped oldest first.
    pub fn open(kind: LedgerKind, path: impl Into<PathBuf>, max_len: usize, clock: SharedClock) -> Result<Self> {
        let path = path.into();
        let mut entries: VecDeque<LedgerEntry> = match read_json::<LedgerFile>(&path)? {
            Some(file) if file.kind != kind => {
                return Err(CacheError::StorageError(format!(
                    "{:?} holds a {} ledger, expected {}",
                    path, file.kind, kind
                )));
            }
            Some(file) => file.entries.into(),
            None => VecDeque::new(),
        };
        truncate_front(&mut entries, max_len);

        info!("Opened {} ledger at {:?} ({} entries)", kind, path, entries.len());
        Self::build(kind, Some(path), max_len, clock, entries)
    }

    /// A ledger that is never written to disk
    pub fn in_memory(kind: LedgerKind, max_len: usize, clock: SharedClock) -> Result<Self> {
        Self::build(kind, None, max_len, clock, VecDeque::new())
    }

    fn build(
        kind: LedgerKind,
        path: Option<PathBuf>,
        max_len: usize,
        clock: SharedClock,
        entries: VecDeque<LedgerEntry>,
    ) -> Result<Self> {
        if max_len == 0 {
            return Err(CacheError::ConfigError(format!(
                "{} ledger max_len must be greater than 0",
                kind
            )));
        }

        Ok(Self {
            kind,
            max_len,
            path,
            clock,
            entries: Mutex::new(entries),
        })
    }

    pub fn kind(&self) -> LedgerKind {
        self.kind
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append `payload` stamped with the current time, drop the oldest
    /// entries beyond `max_len`, and persist before returning.
    ///
    /// If persisting fails the in-memory ledger is left unchanged.
    pub fn add(&self, payload: serde_json::Value) -> Result<LedgerEntry> {
        let mut entries = self.entries.lock()?;

        let entry = LedgerEntry {
            timestamp: self.clock.now(),
            payload,
        };

        let mut next = entries.clone();
        next.push_back(entry.clone());
        truncate_front(&mut next, self.max_len);

        self.persist(&next)?;
        *entries = next;

        debug!("Appended to {} ledger ({} entries)", self.kind, entries.len());
        Ok(entry)
    }

    /// All retained entries, oldest first
    pub fn get_recent(&self) -> Result<Vec<LedgerEntry>> {
        let entries = self.entries.lock()?;
        Ok(entries.iter().cloned().collect())
    }

    /// Retained payloads, oldest first
    pub fn payloads(&self) -> Result<Vec<serde_json::Value>> {
        let entries = self.entries.lock()?;
        Ok(entries.iter().map(|e| e.payload.clone()).collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop every entry and persist the empty ledger
    pub fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock()?;
        self.persist(&VecDeque::new())?;
        entries.clear();
        Ok(())
    }

    fn persist(&self, entries: &VecDeque<LedgerEntry>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let file = LedgerFile {
            version: LEDGER_FILE_VERSION,
            kind: self.kind,
            entries: entries.iter().cloned().collect(),
        };
        write_json_atomic(path, &file)
    }
}

fn truncate_front<T>(entries: &mut VecDeque<T>, max_len: usize) {
    while entries.len() > max_len {
        entries.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_bounded_oldest_dropped_first() {
        let ledger = Ledger::in_memory(LedgerKind::Memory, 3, Arc::new(ManualClock::new())).unwrap();
        for i in 0..5 {
            ledger.add(json!({"step": i})).unwrap();
        }

        assert_eq!(
            ledger.payloads().unwrap(),
            vec![json!({"step": 2}), json!({"step": 3}), json!({"step": 4})]
        );
    }

    #[test]
    fn test_timestamps_follow_clock() {
        let clock = ManualClock::new();
        let ledger = Ledger::in_memory(LedgerKind::Context, 5, Arc::new(clock.clone())).unwrap();

        let first = ledger.add(json!("a")).unwrap();
        clock.advance(Duration::from_secs(30));
        let second = ledger.add(json!("b")).unwrap();

        assert_eq!(second.timestamp - first.timestamp, chrono::Duration::seconds(30));
        assert_eq!(ledger.get_recent().unwrap(), vec![first, second]);
    }

    #[test]
    fn test_zero_max_len_rejected() {
        let result = Ledger::in_memory(LedgerKind::Context, 0, Arc::new(ManualClock::new()));
        assert!(matches!(result, Err(CacheError::ConfigError(_))));
    }

    #[test]
    fn test_persisted_on_every_add() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("context.json");
        let ledger = Ledger::open(LedgerKind::Context, &path, 2, Arc::new(ManualClock::new())).unwrap();

        ledger.add(json!(1)).unwrap();
        ledger.add(json!(2)).unwrap();
        ledger.add(json!(3)).unwrap();

        let saved: LedgerFile = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(saved.kind, LedgerKind::Context);
        let payloads: Vec<_> = saved.entries.into_iter().map(|e| e.payload).collect();
        assert_eq!(payloads, vec![json!(2), json!(3)]);
    }

    #[test]
    fn test_reopen_truncates_to_new_max_len() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("memory.json");
        let clock: SharedClock = Arc::new(ManualClock::new());

        {
            let ledger = Ledger::open(LedgerKind::Memory, &path, 10, clock.clone()).unwrap();
            for i in 0..6 {
                ledger.add(json!(i)).unwrap();
            }
        }

        let ledger = Ledger::open(LedgerKind::Memory, &path, 4, clock).unwrap();
        assert_eq!(ledger.kind(), LedgerKind::Memory);
        assert_eq!(ledger.max_len(), 4);
        assert_eq!(ledger.path(), Some(path.as_path()));
        assert_eq!(ledger.payloads().unwrap(), vec![json!(2), json!(3), json!(4), json!(5)]);
    }

    #[test]
    fn test_kind_mismatch_is_storage_failure() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ledger.json");
        let clock: SharedClock = Arc::new(ManualClock::new());

        Ledger::open(LedgerKind::Memory, &path, 3, clock.clone())
            .unwrap()
            .add(json!("step"))
            .unwrap();

        let err = Ledger::open(LedgerKind::Context, &path, 3, clock)
            .err()
            .expect("kind mismatch should fail");
        assert!(err.is_storage_failure());
    }

    #[test]
    fn test_failed_persist_rolls_back() {
        let tmp = TempDir::new().unwrap();
        // A directory where the ledger file should be makes the rename fail
        let path = tmp.path().join("context.json");
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        let ledger = Ledger {
            kind: LedgerKind::Context,
            max_len: 5,
            path: Some(path),
            clock: Arc::new(ManualClock::new()),
            entries: Mutex::new(VecDeque::new()),
        };

        assert!(ledger.add(json!("lost")).is_err());
        assert!(ledger.is_empty().unwrap());
    }
}
