//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CacheError;

/// Cache key type
pub type CacheKey = String;

/// Cache value type - any JSON-representable value
pub type CacheValue = serde_json::Value;

/// The five registered tiers addressable through the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierName {
    /// Bounded in-memory LRU tier, lost on restart
    ShortTerm,

    /// File-backed tier, one JSON record per key
    MediumTerm,

    /// SQLite-backed tier with per-entry expiry
    LongTerm,

    /// Interaction context ledger
    Context,

    /// Execution step ledger
    Memory,
}

impl TierName {
    /// All registered tiers, in declaration order
    pub const ALL: [TierName; 5] = [
        TierName::ShortTerm,
        TierName::MediumTerm,
        TierName::LongTerm,
        TierName::Context,
        TierName::Memory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TierName::ShortTerm => "short_term",
            TierName::MediumTerm => "medium_term",
            TierName::LongTerm => "long_term",
            TierName::Context => "context",
            TierName::Memory => "memory",
        }
    }

    /// Whether the tier supports keyed get/set (ledgers do not)
    pub fn is_keyed(&self) -> bool {
        matches!(
            self,
            TierName::ShortTerm | TierName::MediumTerm | TierName::LongTerm
        )
    }
}

impl fmt::Display for TierName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TierName {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TierName::ALL
            .into_iter()
            .find(|tier| tier.as_str() == s)
            .ok_or_else(|| CacheError::UnknownTier(s.to_string()))
    }
}

/// Per-tier counters for cache performance monitoring
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct TierStats {
    /// Reads that returned a value
    pub hits: u64,

    /// Reads that found nothing (including expired entries)
    pub misses: u64,

    /// Successful set operations
    pub writes: u64,

    /// Entries discarded by the recency policy
    pub evictions: u64,

    /// Reads that found an entry past its expiry
    pub expired: u64,

    /// Live entries currently held
    pub entries: usize,
}

impl TierStats {
    /// Cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    pub(crate) fn record_lookup(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }
}

impl fmt::Display for TierStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits: {}, misses: {}, hit_rate: {:.2}%, writes: {}, entries: {}, evictions: {}, expired: {}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.writes,
            self.entries,
            self.evictions,
            self.expired
        )
    }
}
