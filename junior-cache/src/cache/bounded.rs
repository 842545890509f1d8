//! Bounded volatile tier with LRU eviction
//!
//! The short-term tier: a fixed-capacity in-memory map. Contents are lost on
//! process restart.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, trace};

use crate::cache::eviction::LruOrder;
use crate::cache::tier::KeyValueTier;
use crate::cache::types::{CacheKey, CacheValue, TierName, TierStats};
use crate::error::{CacheError, Result};

/// In-memory tier holding at most `capacity` entries
pub struct BoundedTier {
    capacity: usize,
    store: Mutex<BoundedStore>,
}

/// Internal storage, guarded as a whole so no caller observes a map and
/// recency order that disagree
struct BoundedStore {
    entries: HashMap<CacheKey, CacheValue>,
    order: LruOrder,
    stats: TierStats,
}

impl BoundedTier {
    /// Create a tier holding at most `capacity` entries
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CacheError::ConfigError(
                "short-term capacity must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            capacity,
            store: Mutex::new(BoundedStore {
                entries: HashMap::with_capacity(capacity),
                order: LruOrder::with_capacity(capacity),
                stats: TierStats::default(),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get a value, marking it most recently used on hit
    pub fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        let mut guard = self.store.lock()?;
        let store = &mut *guard;

        let value = store.entries.get(key).cloned();
        store.stats.record_lookup(value.is_some());

        if value.is_some() {
            store.order.touch(key);
            debug!("Cache hit (short_term): {}", key);
        } else {
            debug!("Cache miss (short_term): {}", key);
        }

        Ok(value)
    }

    /// Insert or replace a value, evicting the least recently used entry
    /// when a new key arrives at capacity
    pub fn set(&self, key: &str, value: CacheValue) -> Result<()> {
        let mut guard = self.store.lock()?;
        let store = &mut *guard;

        if let Some(existing) = store.entries.get_mut(key) {
            debug!("Updating existing cache entry (short_term): {}", key);
            *existing = value;
        } else {
            if store.entries.len() >= self.capacity {
                if let Some(victim) = store.order.pop_victim() {
                    debug!("Evicting least recently used entry: {}", victim);
                    store.entries.remove(&victim);
                    store.stats.evictions += 1;
                }
            }
            store.entries.insert(key.to_string(), value);
        }

        store.order.touch(key);
        store.stats.writes += 1;
        store.stats.entries = store.entries.len();
        Ok(())
    }

    /// Check presence without touching recency
    pub fn contains_key(&self, key: &str) -> Result<bool> {
        let store = self.store.lock()?;
        Ok(store.entries.contains_key(key))
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let mut guard = self.store.lock()?;
        let store = &mut *guard;
        let removed = store.entries.remove(key).is_some();
        if removed {
            store.order.remove(key);
            store.stats.entries = store.entries.len();
        }
        Ok(removed)
    }

    pub fn clear(&self) -> Result<()> {
        let mut guard = self.store.lock()?;
        let store = &mut *guard;
        store.entries.clear();
        store.order.clear();
        store.stats.entries = 0;
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.store.lock()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Keys from least to most recently used
    pub fn keys_by_recency(&self) -> Result<Vec<CacheKey>> {
        let store = self.store.lock()?;
        Ok(store.order.iter().map(str::to_string).collect())
    }

    pub fn stats(&self) -> Result<TierStats> {
        Ok(self.store.lock()?.stats.clone())
    }
}

impl KeyValueTier for BoundedTier {
    fn name(&self) -> TierName {
        TierName::ShortTerm
    }

    fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        BoundedTier::get(self, key)
    }

    fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> Result<()> {
        if let Some(ttl) = ttl {
            trace!("short_term ignores ttl {:?} for {}", ttl, key);
        }
        BoundedTier::set(self, key, value)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        BoundedTier::remove(self, key)
    }

    fn stats(&self) -> Result<TierStats> {
        BoundedTier::stats(self)
    }
}
