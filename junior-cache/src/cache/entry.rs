//! Persisted cache entry with optional expiry

use crate::cache::types::{CacheKey, CacheValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A cache entry as held by a persisted tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cache key
    pub key: CacheKey,

    /// The cached value
    pub value: CacheValue,

    /// When the entry was written
    pub created_at: DateTime<Utc>,

    /// When the entry stops being visible; `None` never expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Create an entry written at `now` that never expires
    pub fn new(key: CacheKey, value: CacheValue, now: DateTime<Utc>) -> Self {
        Self {
            key,
            value,
            created_at: now,
            expires_at: None,
        }
    }

    /// Create an entry written at `now` expiring after `ttl`
    pub fn with_ttl(key: CacheKey, value: CacheValue, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            expires_at: expiry_after(now, ttl),
            ..Self::new(key, value, now)
        }
    }

    /// Whether the entry is logically invisible at `now`.
    ///
    /// An entry expiring exactly at `now` is already expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Remaining lifetime, `None` if already expired or never expiring
    pub fn time_until_expiration(&self, now: DateTime<Utc>) -> Option<Duration> {
        let expires_at = self.expires_at?;
        (expires_at - now).to_std().ok().filter(|d| !d.is_zero())
    }

    /// Age of the entry at `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }
}

/// Instant `ttl` after `now`; a TTL too large to represent never expires
pub(crate) fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
}
