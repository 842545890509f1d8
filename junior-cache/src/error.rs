//! Error types for cache operations
//!
//! Every failure surfaces as a typed `CacheError`. A logical miss is never an
//! error: tiers return `Ok(None)` for absent or expired keys, so a storage or
//! decoding failure can always be told apart from a genuine absence.

use std::path::PathBuf;
use std::sync::PoisonError;

use thiserror::Error;

use crate::cache::types::TierName;

/// Main error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Tier name not registered with the manager
    #[error("Unknown cache tier: {0}")]
    UnknownTier(String),

    /// Keyed get/set addressed to a ledger tier
    #[error("Tier '{tier}' does not support keyed {operation}")]
    NotKeyed {
        tier: TierName,
        operation: &'static str,
    },

    /// Durable store unreachable or holding corrupt data
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Filesystem error on a tier's durable footprint
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// SQLite driver error (wrapper)
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Embedding producer failure
    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A tier's critical section was poisoned by a panicking holder
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl CacheError {
    /// Wrap an I/O error with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error comes from the durable storage layer
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            CacheError::StorageError(_) | CacheError::Io { .. } | CacheError::Sqlite(_)
        )
    }
}

impl<T> From<PoisonError<T>> for CacheError {
    fn from(e: PoisonError<T>) -> Self {
        CacheError::LockPoisoned(e.to_string())
    }
}
