//! Time source for expiry and ledger timestamps
//!
//! Tiers never call `Utc::now()` directly; they read an injected [`Clock`] so
//! expiry can be exercised by moving time forward instead of sleeping.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// A source of wall-clock time
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Clock shared between the manager and every tier it owns
pub type SharedClock = Arc<dyn Clock>;

/// The real system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually driven clock.
///
/// Time only moves when [`ManualClock::advance`] or [`ManualClock::set`] is
/// called. Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current_ms: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock frozen at the current system time
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Create a clock frozen at the given instant
    pub fn at(start: DateTime<Utc>) -> Self {
        Self {
            current_ms: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    /// Move time forward and return the new current time
    pub fn advance(&self, by: Duration) -> DateTime<Utc> {
        let delta = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        let old = self.current_ms.fetch_add(delta, Ordering::SeqCst);
        millis_to_datetime(old.saturating_add(delta))
    }

    /// Jump to an absolute instant
    pub fn set(&self, to: DateTime<Utc>) {
        self.current_ms.store(to.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        millis_to_datetime(self.current_ms.load(Ordering::SeqCst))
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
