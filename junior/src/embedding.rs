//! fastembed-backed embedding producer

use std::sync::Mutex;

use anyhow::{Context, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use junior_cache::{CacheError, EmbeddingProvider};
use tracing::info;

/// Local embedding model wrapper
pub struct FastEmbedProvider {
    model: Mutex<TextEmbedding>,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Create a provider with the default English model
    pub fn new() -> Result<Self> {
        Self::with_model(EmbeddingModel::BGESmallENV15)
    }

    /// Create with a specific model
    pub fn with_model(model_name: EmbeddingModel) -> Result<Self> {
        info!("Initializing embedding model: {:?}", model_name);

        let dimension = match model_name {
            EmbeddingModel::MultilingualE5Small => 384,
            EmbeddingModel::MultilingualE5Base => 768,
            EmbeddingModel::MultilingualE5Large => 1024,
            EmbeddingModel::AllMiniLML6V2 => 384,
            EmbeddingModel::BGESmallENV15 => 384,
            EmbeddingModel::BGEBaseENV15 => 768,
            _ => 384,
        };

        let mut options = InitOptions::default();
        options.model_name = model_name;
        options.show_download_progress = true;

        let model = TextEmbedding::try_new(options)
            .context("Failed to initialize embedding model")?;

        Ok(Self {
            model: Mutex::new(model),
            dimension,
        })
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> junior_cache::Result<Vec<f32>> {
        let model = self.model.lock()?;
        let embeddings = model
            .embed(vec![text], None)
            .map_err(|e| CacheError::EmbeddingError(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| CacheError::EmbeddingError("No embedding generated".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
