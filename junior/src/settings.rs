//! YAML settings for the `junior` binary

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use junior_cache::{CacheConfig, EmbeddingProvider, HashEmbedder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedding::FastEmbedProvider;

/// Log filter used when neither `RUST_LOG` nor the settings file set one
pub const DEFAULT_LOG_FILTER: &str = "junior=info,junior_cache=info";

const SETTINGS_FILE: &str = "settings.yaml";

/// Which embedding producer backs the knowledge base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderKind {
    /// Local ONNX model via fastembed (downloads on first use)
    Fastembed,
    /// Offline feature hashing
    Hash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheConfig,
    pub embedder: EmbedderKind,
    /// Vector length for the hash embedder
    pub embedding_dimension: usize,
    pub log_filter: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache: CacheConfig::in_dir(default_data_dir().join("cache")),
            embedder: EmbedderKind::Hash,
            embedding_dimension: junior_cache::knowledge::DEFAULT_HASH_DIMENSION,
            log_filter: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file
    /// is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_settings_path(), false),
        };

        if !path.exists() {
            if explicit {
                return Err(anyhow!("Settings file not found: {:?}", path));
            }
            debug!("No settings at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        Self::from_yaml(&raw).with_context(|| format!("Invalid settings in {:?}", path))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        if self.embedder == EmbedderKind::Hash && self.embedding_dimension == 0 {
            return Err(anyhow!("embedding_dimension must be greater than 0"));
        }
        Ok(())
    }

    /// Filter for the tracing subscriber: `RUST_LOG`, then settings, then default
    pub fn log_filter(&self) -> String {
        std::env::var("RUST_LOG")
            .ok()
            .or_else(|| self.log_filter.clone())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
    }

    /// Construct the configured embedding producer
    pub fn build_embedder(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        match self.embedder {
            EmbedderKind::Fastembed => Ok(Arc::new(FastEmbedProvider::new()?)),
            EmbedderKind::Hash => Ok(Arc::new(HashEmbedder::new(self.embedding_dimension)?)),
        }
    }
}

/// Per-user data directory for junior
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("junior"))
        .unwrap_or_else(|| PathBuf::from(".junior"))
}

pub fn default_settings_path() -> PathBuf {
    default_data_dir().join(SETTINGS_FILE)
}
