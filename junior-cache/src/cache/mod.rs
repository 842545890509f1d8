//! # Tiered Cache
//!
//! Three key-value tiers behind one manager, each with its own durability
//! and capacity tradeoff.
//!
//! ## Tiers
//!
//! - **short_term**: bounded in-memory map with pure LRU eviction
//! - **medium_term**: one JSON file per key, unbounded, no expiry
//! - **long_term**: SQLite rows with per-entry TTL checked at read time
//! - **context** / **memory**: bounded ledgers, read back in bulk (see [`crate::ledger`])
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use junior_cache::cache::{CacheConfig, CacheManager, TierName};
//! use junior_cache::knowledge::HashEmbedder;
//! use serde_json::json;
//!
//! # fn example() -> junior_cache::Result<()> {
//! let config = CacheConfig::builder()
//!     .cache_dir("/tmp/junior-cache")
//!     .short_term_capacity(100)
//!     .build();
//!
//! let cache = CacheManager::open(config, Arc::new(HashEmbedder::default()))?;
//!
//! cache.set(
//!     "analysis:src/main.py",
//!     json!({"suggestions": []}),
//!     TierName::LongTerm,
//!     Some(Duration::from_secs(3600)),
//! )?;
//!
//! if let Some(value) = cache.get("analysis:src/main.py", TierName::LongTerm)? {
//!     println!("Cache hit: {}", value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bounded;
pub mod config;
pub mod entry;
pub mod eviction;
pub mod expiry;
pub mod file;
pub mod indexed;
pub mod key;
pub mod manager;
pub mod tier;
pub mod types;

pub use bounded::BoundedTier;
pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::CacheEntry;
pub use expiry::ExpiryPolicy;
pub use file::FileTier;
pub use indexed::IndexedTier;
pub use key::{CacheKeyBuilder, KeyKind};
pub use manager::{start_auto_compaction, CacheManager, CacheReport};
pub use tier::KeyValueTier;
pub use types::{CacheKey, CacheValue, TierName, TierStats};
