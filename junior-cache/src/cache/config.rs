//! Configuration for the cache manager

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::expiry::ExpiryPolicy;
use crate::error::{CacheError, Result};

/// Configuration for every tier, ledger and the knowledge base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root directory for all durable tiers
    pub cache_dir: PathBuf,

    /// Maximum number of entries in the short-term tier
    pub short_term_capacity: usize,

    /// Number of context entries retained
    pub context_max_len: usize,

    /// Number of memory steps retained
    pub memory_max_len: usize,

    /// TTL applied to long-term writes that pass none.
    /// `None` means such entries never expire
    pub default_ttl_secs: Option<u64>,

    /// TTL jitter factor (0.0 - 1.0)
    /// Adds random variation so entries written together do not expire together
    pub ttl_jitter: f64,

    /// Persist knowledge base documents and reload them on open
    pub persist_knowledge: bool,

    /// Interval for the optional background compaction task
    pub compaction_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".junior/cache"),
            short_term_capacity: 100,
            context_max_len: 5,
            memory_max_len: 10,
            default_ttl_secs: None,
            ttl_jitter: 0.0,
            persist_knowledge: true,
            // Compact every 5 minutes
            compaction_interval_secs: 300,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Default configuration rooted at `cache_dir`
    pub fn in_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.short_term_capacity == 0 {
            return Err(CacheError::ConfigError(
                "short_term_capacity must be greater than 0".to_string(),
            ));
        }

        if self.context_max_len == 0 {
            return Err(CacheError::ConfigError(
                "context_max_len must be greater than 0".to_string(),
            ));
        }

        if self.memory_max_len == 0 {
            return Err(CacheError::ConfigError(
                "memory_max_len must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.ttl_jitter) {
            return Err(CacheError::ConfigError(
                "ttl_jitter must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.compaction_interval_secs == 0 {
            return Err(CacheError::ConfigError(
                "compaction_interval_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_secs.map(Duration::from_secs)
    }

    pub fn compaction_interval(&self) -> Duration {
        Duration::from_secs(self.compaction_interval_secs)
    }

    /// Expiry policy for the long-term tier
    pub fn expiry_policy(&self) -> ExpiryPolicy {
        ExpiryPolicy::new(self.default_ttl(), self.ttl_jitter)
    }

    pub fn medium_term_dir(&self) -> PathBuf {
        self.cache_dir.join("medium_term")
    }

    pub fn long_term_path(&self) -> PathBuf {
        self.cache_dir.join("long_term.db")
    }

    pub fn context_path(&self) -> PathBuf {
        self.cache_dir.join("context.json")
    }

    pub fn memory_path(&self) -> PathBuf {
        self.cache_dir.join("memory.json")
    }

    pub fn knowledge_path(&self) -> PathBuf {
        self.cache_dir.join("knowledge.jsonl")
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    cache_dir: Option<PathBuf>,
    short_term_capacity: Option<usize>,
    context_max_len: Option<usize>,
    memory_max_len: Option<usize>,
    default_ttl: Option<Duration>,
    ttl_jitter: Option<f64>,
    persist_knowledge: Option<bool>,
    compaction_interval: Option<Duration>,
}

impl CacheConfigBuilder {
    /// Set the root directory for durable tiers
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Set maximum number of short-term entries
    pub fn short_term_capacity(mut self, capacity: usize) -> Self {
        self.short_term_capacity = Some(capacity);
        self
    }

    pub fn context_max_len(mut self, len: usize) -> Self {
        self.context_max_len = Some(len);
        self
    }

    pub fn memory_max_len(mut self, len: usize) -> Self {
        self.memory_max_len = Some(len);
        self
    }

    /// Set TTL for long-term writes that pass none (whole seconds)
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Set TTL jitter factor (0.0 - 1.0)
    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.ttl_jitter = Some(jitter);
        self
    }

    pub fn persist_knowledge(mut self, persist: bool) -> Self {
        self.persist_knowledge = Some(persist);
        self
    }

    /// Set background compaction interval (whole seconds, at least one)
    pub fn compaction_interval(mut self, interval: Duration) -> Self {
        self.compaction_interval = Some(interval);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            cache_dir: self.cache_dir.unwrap_or(defaults.cache_dir),
            short_term_capacity: self
                .short_term_capacity
                .unwrap_or(defaults.short_term_capacity),
            context_max_len: self.context_max_len.unwrap_or(defaults.context_max_len),
            memory_max_len: self.memory_max_len.unwrap_or(defaults.memory_max_len),
            default_ttl_secs: self
                .default_ttl
                .map(|ttl| ttl.as_secs())
                .or(defaults.default_ttl_secs),
            ttl_jitter: self.ttl_jitter.unwrap_or(defaults.ttl_jitter),
            persist_knowledge: self.persist_knowledge.unwrap_or(defaults.persist_knowledge),
            compaction_interval_secs: self
                .compaction_interval
                .map(|interval| interval.as_secs().max(1))
                .unwrap_or(defaults.compaction_interval_secs),
        }
    }
}
