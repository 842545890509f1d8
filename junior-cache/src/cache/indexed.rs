//! Persistent indexed tier backed by SQLite
//!
//! The long-term tier. One row per key holding `(value, created_at,
//! expires_at)`. Expiry is enforced in the read query itself: a row whose
//! `expires_at` has passed is never returned, even though it stays on disk
//! until [`IndexedTier::compact_expired`] removes it.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::cache::entry::CacheEntry;
use crate::cache::expiry::ExpiryPolicy;
use crate::cache::tier::KeyValueTier;
use crate::cache::types::{CacheValue, TierName, TierStats};
use crate::clock::SharedClock;
use crate::error::{CacheError, Result};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS cache_entries (
        key        TEXT PRIMARY KEY,
        value      TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        expires_at INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at
        ON cache_entries (expires_at)
        WHERE expires_at IS NOT NULL;
";

/// SQLite-backed tier with read-time expiry
pub struct IndexedTier {
    state: Mutex<IndexedState>,
    clock: SharedClock,
    expiry: ExpiryPolicy,
}

struct IndexedState {
    conn: Connection,
    stats: TierStats,
}

impl IndexedTier {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: &Path, clock: SharedClock, expiry: ExpiryPolicy) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        info!("Opened long-term tier at {:?}", path);

        Self::from_connection(conn, clock, expiry)
    }

    /// Open a private in-memory database (for tests and ephemeral managers)
    pub fn open_in_memory(clock: SharedClock, expiry: ExpiryPolicy) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, clock, expiry)
    }

    fn from_connection(conn: Connection, clock: SharedClock, expiry: ExpiryPolicy) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            state: Mutex::new(IndexedState {
                conn,
                stats: TierStats::default(),
            }),
            clock,
            expiry,
        })
    }

    pub fn expiry_policy(&self) -> &ExpiryPolicy {
        &self.expiry
    }

    pub fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        let mut state = self.state.lock()?;
        let now = self.clock.now();

        let entry = select_live(&state.conn, key, now)?;
        state.stats.record_lookup(entry.is_some());

        if entry.is_none() && row_exists(&state.conn, key)? {
            debug!("Cache entry expired (long_term): {}", key);
            state.stats.expired += 1;
        } else if entry.is_some() {
            debug!("Cache hit (long_term): {}", key);
        } else {
            debug!("Cache miss (long_term): {}", key);
        }

        Ok(entry.map(|e| e.value))
    }

    /// Full live record for `key`, with timestamps
    pub fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let state = self.state.lock()?;
        select_live(&state.conn, key, self.clock.now())
    }

    /// Upsert `value` under `key`; `ttl` of `None` defers to the expiry
    /// policy's default
    pub fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> Result<()> {
        let encoded = serde_json::to_string(&value)?;
        let now = self.clock.now();
        let expires_at = self.expiry.expires_at(now, ttl);

        let mut state = self.state.lock()?;
        state.conn.execute(
            "INSERT OR REPLACE INTO cache_entries (key, value, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                key,
                encoded,
                now.timestamp_millis(),
                expires_at.map(ceil_millis)
            ],
        )?;
        state.stats.writes += 1;

        debug!("Stored long_term record: {} (expires_at: {:?})", key, expires_at);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let state = self.state.lock()?;
        let removed = state
            .conn
            .execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    /// Physically delete rows whose expiry has passed.
    ///
    /// Runs under the tier lock so it cannot race a read that has already
    /// validated freshness.
    pub fn compact_expired(&self) -> Result<usize> {
        let state = self.state.lock()?;
        let now = self.clock.now();
        let removed = state.conn.execute(
            "DELETE FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now.timestamp_millis()],
        )?;

        if removed > 0 {
            info!("Compacted {} expired long_term rows", removed);
        }
        Ok(removed)
    }

    /// Whether a live record exists, without counting a lookup
    pub fn contains_key(&self, key: &str) -> Result<bool> {
        let state = self.state.lock()?;
        Ok(select_live(&state.conn, key, self.clock.now())?.is_some())
    }

    /// Number of live (unexpired) records
    pub fn len(&self) -> Result<usize> {
        let state = self.state.lock()?;
        count_live(&state.conn, self.clock.now())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of physical rows, including expired ones not yet compacted
    pub fn row_count(&self) -> Result<usize> {
        let state = self.state.lock()?;
        let count: i64 = state
            .conn
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn clear(&self) -> Result<usize> {
        let state = self.state.lock()?;
        Ok(state.conn.execute("DELETE FROM cache_entries", [])?)
    }

    pub fn stats(&self) -> Result<TierStats> {
        let state = self.state.lock()?;
        let mut stats = state.stats.clone();
        stats.entries = count_live(&state.conn, self.clock.now())?;
        Ok(stats)
    }
}

impl KeyValueTier for IndexedTier {
    fn name(&self) -> TierName {
        TierName::LongTerm
    }

    fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        IndexedTier::get(self, key)
    }

    fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> Result<()> {
        IndexedTier::set(self, key, value, ttl)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        IndexedTier::remove(self, key)
    }

    fn stats(&self) -> Result<TierStats> {
        IndexedTier::stats(self)
    }
}

fn select_live(conn: &Connection, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>> {
    let row = conn
        .query_row(
            "SELECT value, created_at, expires_at FROM cache_entries
             WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
            params![key, now.timestamp_millis()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            },
        )
        .optional()?;

    let Some((encoded, created_at, expires_at)) = row else {
        return Ok(None);
    };

    let value = serde_json::from_str(&encoded).map_err(|e| {
        CacheError::StorageError(format!("corrupt long_term value for {:?}: {}", key, e))
    })?;

    Ok(Some(CacheEntry {
        key: key.to_string(),
        value,
        created_at: millis_to_datetime(created_at)?,
        expires_at: expires_at.map(millis_to_datetime).transpose()?,
    }))
}

fn row_exists(conn: &Connection, key: &str) -> Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM cache_entries WHERE key = ?1",
            params![key],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

fn count_live(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM cache_entries WHERE expires_at IS NULL OR expires_at > ?1",
        params![now.timestamp_millis()],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Whole milliseconds at or after `t`, so a stored deadline never lands
/// before the requested one
fn ceil_millis(t: DateTime<Utc>) -> i64 {
    let ms = t.timestamp_millis();
    if t.timestamp_subsec_nanos() % 1_000_000 == 0 {
        ms
    } else {
        ms + 1
    }
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| CacheError::StorageError(format!("timestamp out of range: {}", ms)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use serde_json::json;
    use std::sync::Arc;

    fn tier_with_clock() -> (IndexedTier, ManualClock) {
        let clock = ManualClock::new();
        let tier = IndexedTier::open_in_memory(Arc::new(clock.clone()), ExpiryPolicy::never()).unwrap();
        (tier, clock)
    }

    #[test]
    fn test_set_then_get() {
        let (tier, _) = tier_with_clock();
        tier.set("k", json!({"nested": [1, 2.5, "x", null]}), None).unwrap();
        assert_eq!(
            tier.get("k").unwrap(),
            Some(json!({"nested": [1, 2.5, "x", null]}))
        );
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let (tier, clock) = tier_with_clock();
        tier.set("k", json!("forever"), None).unwrap();
        clock.advance(Duration::from_secs(10 * 365 * 24 * 3600));
        assert_eq!(tier.get("k").unwrap(), Some(json!("forever")));
        assert!(tier.get_entry("k").unwrap().unwrap().expires_at.is_none());
    }

    #[test]
    fn test_ttl_expiry_is_read_time() {
        let (tier, clock) = tier_with_clock();
        tier.set("k", json!("v"), Some(Duration::from_secs(60))).unwrap();

        clock.advance(Duration::from_secs(59));
        assert_eq!(tier.get("k").unwrap(), Some(json!("v")));

        clock.advance(Duration::from_secs(1));
        assert_eq!(tier.get("k").unwrap(), None);

        // Row is still physically present until compaction
        assert_eq!(tier.row_count().unwrap(), 1);
        assert_eq!(tier.len().unwrap(), 0);
        assert!(!tier.contains_key("k").unwrap());

        let stats = tier.stats().unwrap();
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_upsert_replaces_timestamps() {
        let (tier, clock) = tier_with_clock();
        tier.set("k", json!(1), Some(Duration::from_secs(10))).unwrap();
        clock.advance(Duration::from_secs(5));
        tier.set("k", json!(2), None).unwrap();

        let entry = tier.get_entry("k").unwrap().unwrap();
        assert_eq!(entry.value, json!(2));
        assert_eq!(entry.created_at, clock.now());
        assert!(entry.expires_at.is_none());
        assert_eq!(tier.row_count().unwrap(), 1);
    }

    #[test]
    fn test_compact_expired() {
        let (tier, clock) = tier_with_clock();
        tier.set("short", json!(1), Some(Duration::from_secs(1))).unwrap();
        tier.set("long", json!(2), Some(Duration::from_secs(3600))).unwrap();
        tier.set("forever", json!(3), None).unwrap();

        clock.advance(Duration::from_secs(2));
        assert_eq!(tier.compact_expired().unwrap(), 1);
        assert_eq!(tier.row_count().unwrap(), 2);
        assert_eq!(tier.get("long").unwrap(), Some(json!(2)));
    }

    #[test]
    fn test_default_ttl_from_policy() {
        let clock = ManualClock::new();
        let tier = IndexedTier::open_in_memory(
            Arc::new(clock.clone()),
            ExpiryPolicy::new(Some(Duration::from_secs(30)), 0.0),
        )
        .unwrap();

        assert_eq!(tier.expiry_policy().default_ttl(), Some(Duration::from_secs(30)));

        tier.set("k", json!(1), None).unwrap();
        clock.advance(Duration::from_secs(31));
        assert_eq!(tier.get("k").unwrap(), None);
    }

    #[test]
    fn test_sub_millisecond_ttl_rounds_up() {
        let (tier, clock) = tier_with_clock();
        tier.set("k", json!("brief"), Some(Duration::from_micros(500))).unwrap();

        assert_eq!(tier.get("k").unwrap(), Some(json!("brief")));
        let expires_at = tier.get_entry("k").unwrap().unwrap().expires_at.unwrap();
        assert!(expires_at > clock.now());

        clock.advance(Duration::from_millis(1));
        assert_eq!(tier.get("k").unwrap(), None);
    }

    #[test]
    fn test_expiry_deadline_never_truncated() {
        let at = DateTime::from_timestamp_millis(1_000).unwrap() + chrono::Duration::microseconds(1);
        assert_eq!(ceil_millis(at), 1_001);
        assert_eq!(ceil_millis(DateTime::from_timestamp_millis(1_000).unwrap()), 1_000);
    }

    #[test]
    fn test_corrupt_value_is_storage_failure() {
        let (tier, _) = tier_with_clock();
        {
            let state = tier.state.lock().unwrap();
            state
                .conn
                .execute(
                    "INSERT INTO cache_entries (key, value, created_at, expires_at) VALUES ('bad', '{oops', 0, NULL)",
                    [],
                )
                .unwrap();
        }

        let err = tier.get("bad").unwrap_err();
        assert!(err.is_storage_failure());
    }

    #[test]
    fn test_persists_across_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("long_term.db");
        let clock: SharedClock = Arc::new(ManualClock::new());

        {
            let tier = IndexedTier::open(&path, clock.clone(), ExpiryPolicy::never()).unwrap();
            tier.set("k", json!({"kept": true}), None).unwrap();
        }

        let tier = IndexedTier::open(&path, clock, ExpiryPolicy::never()).unwrap();
        assert_eq!(tier.get("k").unwrap(), Some(json!({"kept": true})));
    }
}
