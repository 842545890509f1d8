//! # junior-cache
//!
//! Multi-tier caching and retrieval layer for an assistant that sits in
//! front of slow producers (LLM calls, static analysis).
//!
//! ## Features
//!
//! - Bounded LRU, file-backed and SQLite tiers behind one [`CacheManager`]
//! - Read-time TTL expiry with optional background compaction
//! - Bounded context and step-memory ledgers that survive restarts
//! - Document store with cosine-similarity search over injected embeddings
//! - Typed access and get-or-compute helpers
//!
//! Every operation is synchronous and guarded by its own tier's lock.
//! Absence is `Ok(None)`; failures are always a typed [`CacheError`].

pub mod cache;
pub mod clock;
pub mod error;
pub mod knowledge;
pub mod ledger;
mod persist;

pub use cache::{
    start_auto_compaction, CacheConfig, CacheConfigBuilder, CacheKeyBuilder, CacheManager,
    CacheReport, KeyKind, TierName, TierStats,
};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{CacheError, Result};
pub use knowledge::{Document, EmbeddingProvider, HashEmbedder, KnowledgeBase, SearchHit};
pub use ledger::{Ledger, LedgerEntry, LedgerKind};
