//! Time-to-live policy for persisted entries
//!
//! Expiry is checked lazily at read time. Nothing sweeps in the background
//! unless a compaction job is explicitly started.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::entry::expiry_after;

/// Decides when a persisted entry stops being visible
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiryPolicy {
    /// TTL applied when the caller passes none; `None` keeps entries forever
    default_ttl: Option<Duration>,

    /// Random +/- fraction applied to effective TTLs (0.0 - 1.0)
    jitter: f64,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::never()
    }
}

impl ExpiryPolicy {
    /// Entries without an explicit TTL never expire; explicit TTLs are exact
    pub fn never() -> Self {
        Self {
            default_ttl: None,
            jitter: 0.0,
        }
    }

    pub fn new(default_ttl: Option<Duration>, jitter: f64) -> Self {
        Self {
            default_ttl,
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// TTL actually applied for a write that requested `requested`
    pub fn effective_ttl(&self, requested: Option<Duration>) -> Option<Duration> {
        let ttl = requested.or(self.default_ttl)?;
        Some(self.apply_jitter(ttl))
    }

    /// Expiry instant for a write at `now`
    pub fn expires_at(&self, now: DateTime<Utc>, requested: Option<Duration>) -> Option<DateTime<Utc>> {
        self.effective_ttl(requested)
            .and_then(|ttl| expiry_after(now, ttl))
    }

    fn apply_jitter(&self, ttl: Duration) -> Duration {
        if self.jitter == 0.0 {
            return ttl;
        }

        let base_secs = ttl.as_secs_f64();
        let jitter_range = base_secs * self.jitter;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
        let final_secs = (base_secs + jitter).max(0.001);

        Duration::try_from_secs_f64(final_secs).unwrap_or(ttl)
    }
}
