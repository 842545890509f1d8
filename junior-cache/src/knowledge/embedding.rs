//! Embedding producers
//!
//! The knowledge base never computes embeddings itself; it asks an injected
//! [`EmbeddingProvider`]. [`HashEmbedder`] is a deterministic offline producer
//! based on feature hashing, used when no model is available and in tests.

use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

/// Default dimension for the hash embedder
pub const DEFAULT_HASH_DIMENSION: usize = 256;

/// Turns text into a fixed-length vector.
///
/// Repeated calls on identical text must return vectors comparable by cosine
/// similarity, and every vector must have `dimension()` components.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;
}

/// Feature-hashing embedder.
///
/// Each lowercase alphanumeric token is hashed with SHA-256 into one signed
/// bucket; the bucket counts are L2-normalized. Text with no tokens embeds
/// to the zero vector, which search treats as carrying no information.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(CacheError::ConfigError(
                "embedding dimension must be greater than 0".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut index_bytes = [0u8; 8];
        index_bytes.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(index_bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_HASH_DIMENSION,
        }
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let (index, sign) = self.bucket(&token.to_lowercase());
            vector[index] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vector.iter_mut() {
                *x /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
