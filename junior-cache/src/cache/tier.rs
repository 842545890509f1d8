//! Uniform get/set contract shared by the key-value tiers

use std::time::Duration;

use crate::cache::types::{CacheValue, TierName, TierStats};
use crate::error::Result;

/// A keyed storage backend addressed by the manager.
///
/// A miss is `Ok(None)`; `Err` always means the tier itself failed.
pub trait KeyValueTier: Send + Sync {
    /// Identity the tier is registered under
    fn name(&self) -> TierName;

    fn get(&self, key: &str) -> Result<Option<CacheValue>>;

    /// Store `value` under `key`. Tiers without expiry ignore `ttl`.
    fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> Result<()>;

    /// Remove `key`, returning whether a record existed
    fn remove(&self, key: &str) -> Result<bool>;

    fn stats(&self) -> Result<TierStats>;
}
