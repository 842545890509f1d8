//! Cache manager: owns every tier and dispatches by tier name
//!
//! The manager holds no caching logic of its own. It constructs each tier,
//! ledger and the knowledge base once and routes calls to them. Tiers never
//! call each other and never share a lock.

use std::fmt;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::bounded::BoundedTier;
use crate::cache::config::CacheConfig;
use crate::cache::file::FileTier;
use crate::cache::indexed::IndexedTier;
use crate::cache::tier::KeyValueTier;
use crate::cache::types::{CacheValue, TierName, TierStats};
use crate::clock::{SharedClock, SystemClock};
use crate::error::{CacheError, Result};
use crate::knowledge::{Document, EmbeddingProvider, KnowledgeBase, SearchHit};
use crate::ledger::{Ledger, LedgerEntry, LedgerKind};

/// Snapshot of every tier's counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheReport {
    pub short_term: TierStats,
    pub medium_term: TierStats,
    pub long_term: TierStats,
    pub context_entries: usize,
    pub memory_entries: usize,
    pub documents: usize,
}

impl fmt::Display for CacheReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "short_term:  {}", self.short_term)?;
        writeln!(f, "medium_term: {}", self.medium_term)?;
        writeln!(f, "long_term:   {}", self.long_term)?;
        writeln!(f, "context:     {} entries", self.context_entries)?;
        writeln!(f, "memory:      {} entries", self.memory_entries)?;
        write!(f, "knowledge:   {} documents", self.documents)
    }
}

/// Facade over the three key-value tiers, two ledgers and the knowledge base
pub struct CacheManager {
    config: CacheConfig,
    short_term: BoundedTier,
    medium_term: FileTier,
    long_term: IndexedTier,
    context: Ledger,
    memory: Ledger,
    knowledge: KnowledgeBase,
}

impl CacheManager {
    /// Open every tier under `config.cache_dir` using the system clock
    pub fn open(config: CacheConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        Self::open_with_clock(config, embedder, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        config: CacheConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        clock: SharedClock,
    ) -> Result<Self> {
        config.validate()?;

        let dir = config.cache_dir();
        fs::create_dir_all(dir).map_err(|e| CacheError::io(dir, e))?;

        let short_term = BoundedTier::new(config.short_term_capacity)?;
        let medium_term = FileTier::open(config.medium_term_dir(), clock.clone())?;
        let long_term = IndexedTier::open(&config.long_term_path(), clock.clone(), config.expiry_policy())?;
        let context = Ledger::open(
            LedgerKind::Context,
            config.context_path(),
            config.context_max_len,
            clock.clone(),
        )?;
        let memory = Ledger::open(
            LedgerKind::Memory,
            config.memory_path(),
            config.memory_max_len,
            clock.clone(),
        )?;
        let knowledge = if config.persist_knowledge {
            KnowledgeBase::open(config.knowledge_path(), embedder, clock)?
        } else {
            KnowledgeBase::in_memory(embedder, clock)
        };

        info!("Cache manager ready at {:?}", config.cache_dir());

        Ok(Self {
            config,
            short_term,
            medium_term,
            long_term,
            context,
            memory,
            knowledge,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn short_term(&self) -> &BoundedTier {
        &self.short_term
    }

    pub fn medium_term(&self) -> &FileTier {
        &self.medium_term
    }

    pub fn long_term(&self) -> &IndexedTier {
        &self.long_term
    }

    pub fn context(&self) -> &Ledger {
        &self.context
    }

    pub fn memory(&self) -> &Ledger {
        &self.memory
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    fn keyed_tier(&self, tier: TierName, operation: &'static str) -> Result<&dyn KeyValueTier> {
        match tier {
            TierName::ShortTerm => Ok(&self.short_term),
            TierName::MediumTerm => Ok(&self.medium_term),
            TierName::LongTerm => Ok(&self.long_term),
            TierName::Context | TierName::Memory => Err(CacheError::NotKeyed { tier, operation }),
        }
    }

    /// Value stored under `key` in `tier`, or `None` on a miss
    pub fn get(&self, key: &str, tier: TierName) -> Result<Option<CacheValue>> {
        self.keyed_tier(tier, "get")?.get(key)
    }

    /// Store `value` under `key` in `tier`.
    ///
    /// `ttl` applies to `long_term` only; the other tiers ignore it.
    pub fn set(&self, key: &str, value: CacheValue, tier: TierName, ttl: Option<Duration>) -> Result<()> {
        self.keyed_tier(tier, "set")?.set(key, value, ttl)
    }

    /// `get` with the tier given by name
    pub fn get_named(&self, key: &str, tier_name: &str) -> Result<Option<CacheValue>> {
        self.get(key, tier_name.parse()?)
    }

    /// `set` with the tier given by name
    pub fn set_named(
        &self,
        key: &str,
        value: CacheValue,
        tier_name: &str,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.set(key, value, tier_name.parse()?, ttl)
    }

    pub fn remove(&self, key: &str, tier: TierName) -> Result<bool> {
        self.keyed_tier(tier, "remove")?.remove(key)
    }

    /// Typed read; a stored value of the wrong shape is a serialization error
    pub fn get_as<T: DeserializeOwned>(&self, key: &str, tier: TierName) -> Result<Option<T>> {
        match self.get(key, tier)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn set_as<T: Serialize>(&self, key: &str, value: &T, tier: TierName, ttl: Option<Duration>) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(key, value, tier, ttl)
    }

    /// Cached value for `key`, or the producer's output stored and returned.
    ///
    /// The producer runs without any tier lock held. A producer error is
    /// returned as-is and nothing is stored.
    pub fn get_or_compute<F, E>(
        &self,
        key: &str,
        tier: TierName,
        ttl: Option<Duration>,
        producer: F,
    ) -> std::result::Result<CacheValue, E>
    where
        F: FnOnce() -> std::result::Result<CacheValue, E>,
        E: From<CacheError>,
    {
        if let Some(value) = self.get(key, tier)? {
            return Ok(value);
        }

        debug!("Computing value for {} ({})", key, tier);
        let value = producer()?;
        self.set(key, value.clone(), tier, ttl)?;
        Ok(value)
    }

    pub fn add_to_context(&self, payload: serde_json::Value) -> Result<LedgerEntry> {
        self.context.add(payload)
    }

    /// Retained context entries, oldest first
    pub fn get_recent_context(&self) -> Result<Vec<LedgerEntry>> {
        self.context.get_recent()
    }

    pub fn add_to_memory(&self, step: serde_json::Value) -> Result<LedgerEntry> {
        self.memory.add(step)
    }

    /// Retained execution steps, oldest first
    pub fn get_memory_steps(&self) -> Result<Vec<LedgerEntry>> {
        self.memory.get_recent()
    }

    pub fn add_document(&self, content: serde_json::Value) -> Result<Document> {
        self.knowledge.add_document(content)
    }

    pub fn add_document_with_embedding(&self, content: serde_json::Value, embedding: Vec<f32>) -> Result<Document> {
        self.knowledge.add_document_with_embedding(content, embedding)
    }

    /// Best matching documents for `query`, at most five
    pub fn search_knowledge_base(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.knowledge.search(query)
    }

    /// Delete expired long-term rows
    pub fn compact_expired(&self) -> Result<usize> {
        self.long_term.compact_expired()
    }

    pub fn stats(&self) -> Result<CacheReport> {
        Ok(CacheReport {
            short_term: self.short_term.stats()?,
            medium_term: self.medium_term.stats()?,
            long_term: self.long_term.stats()?,
            context_entries: self.context.len()?,
            memory_entries: self.memory.len()?,
            documents: self.knowledge.len()?,
        })
    }
}

/// Periodically compact expired long-term rows.
///
/// Runs until the surrounding task is dropped or aborted. Each pass runs on
/// the blocking pool; failures are logged and the loop continues.
pub async fn start_auto_compaction(manager: Arc<CacheManager>, interval: Duration) {
    info!("Starting automatic compaction task (interval: {:?})", interval);

    loop {
        tokio::time::sleep(interval).await;

        let pass = Arc::clone(&manager);
        match tokio::task::spawn_blocking(move || pass.compact_expired()).await {
            Ok(Ok(removed)) => {
                if removed > 0 {
                    debug!("Auto compaction removed {} rows", removed);
                }
            }
            Ok(Err(e)) => {
                warn!("Auto compaction failed: {}", e);
            }
            Err(e) => {
                warn!("Auto compaction task panicked: {}", e);
            }
        }
    }
}
