//! Document store with brute-force cosine search

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::SharedClock;
use crate::error::{CacheError, Result};
use crate::knowledge::embedding::EmbeddingProvider;
use crate::knowledge::similarity::rank;

/// Number of hits returned by every search
pub const SEARCH_RESULT_LIMIT: usize = 5;

/// Object fields tried, in order, when choosing the text to embed
const TEXT_FIELDS: [&str; 3] = ["text", "content", "summary"];

/// A stored document and its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub content: serde_json::Value,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// One ranked search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub document: Document,
    /// Cosine similarity in [-1, 1]
    pub score: f64,
}

/// Text handed to the embedding producer for a document.
///
/// Strings embed as-is. Objects embed their first string field among
/// `text`, `content` and `summary`. Anything else embeds its compact JSON.
pub fn document_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => TEXT_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(|v| v.as_str()))
            .map(str::to_string)
            .unwrap_or_else(|| content.to_string()),
        other => other.to_string(),
    }
}

/// Append-only document store.
///
/// Search is a full scan over every document; there is no secondary index
/// and no capacity bound.
pub struct KnowledgeBase {
    embedder: Arc<dyn EmbeddingProvider>,
    clock: SharedClock,
    path: Option<PathBuf>,
    documents: Mutex<Vec<Document>>,
}

impl KnowledgeBase {
    /// Open a store persisted as JSON lines at `path`, reloading saved documents
    pub fn open(path: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingProvider>, clock: SharedClock) -> Result<Self> {
        let path = path.into();
        let documents = load_documents(&path)?;
        info!("Opened knowledge base at {:?} ({} documents)", path, documents.len());

        Ok(Self {
            embedder,
            clock,
            path: Some(path),
            documents: Mutex::new(documents),
        })
    }

    pub fn in_memory(embedder: Arc<dyn EmbeddingProvider>, clock: SharedClock) -> Self {
        Self {
            embedder,
            clock,
            path: None,
            documents: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Embed `content` with the injected producer and store it
    pub fn add_document(&self, content: serde_json::Value) -> Result<Document> {
        // Embedding can be slow; do it before taking the lock
        let embedding = self.embedder.embed(&document_text(&content))?;
        self.insert(content, embedding)
    }

    /// Store `content` under an embedding the caller already holds
    pub fn add_document_with_embedding(
        &self,
        content: serde_json::Value,
        embedding: Vec<f32>,
    ) -> Result<Document> {
        self.insert(content, embedding)
    }

    /// Top documents for `query`, best first
    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let query_embedding = self.embedder.embed(query)?;
        self.search_by_embedding(&query_embedding)
    }

    /// Top documents for a precomputed query vector, best first
    pub fn search_by_embedding(&self, query: &[f32]) -> Result<Vec<SearchHit>> {
        let documents = self.documents.lock()?;

        let ranked = rank(
            query,
            documents.iter().map(|d| d.embedding.as_slice()),
            SEARCH_RESULT_LIMIT,
        );
        debug!(
            "Knowledge search scored {} documents, returning {}",
            documents.len(),
            ranked.len()
        );

        Ok(ranked
            .into_iter()
            .map(|(idx, score)| SearchHit {
                document: documents[idx].clone(),
                score,
            })
            .collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.documents.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Snapshot of every document in insertion order
    pub fn documents(&self) -> Result<Vec<Document>> {
        Ok(self.documents.lock()?.clone())
    }

    /// Reject vectors that could not be scored or would not reload
    fn check_embedding(&self, embedding: &[f32]) -> Result<()> {
        if embedding.is_empty() {
            return Err(CacheError::EmbeddingError(
                "document embedding is empty".to_string(),
            ));
        }

        let expected = self.embedder.dimension();
        if embedding.len() != expected {
            return Err(CacheError::EmbeddingError(format!(
                "document embedding has {} components, expected {}",
                embedding.len(),
                expected
            )));
        }

        if let Some(idx) = embedding.iter().position(|x| !x.is_finite()) {
            return Err(CacheError::EmbeddingError(format!(
                "document embedding component {} is not finite",
                idx
            )));
        }

        Ok(())
    }

    fn insert(&self, content: serde_json::Value, embedding: Vec<f32>) -> Result<Document> {
        self.check_embedding(&embedding)?;

        let document = Document {
            id: Uuid::new_v4(),
            content,
            embedding,
            created_at: self.clock.now(),
        };

        let mut documents = self.documents.lock()?;
        if let Some(path) = &self.path {
            append_document(path, &document)?;
        }
        documents.push(document.clone());

        debug!("Added document {} ({} total)", document.id, documents.len());
        Ok(document)
    }
}

fn load_documents(path: &Path) -> Result<Vec<Document>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CacheError::io(path, e)),
    };

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| {
                CacheError::StorageError(format!(
                    "corrupt document at {:?} line {}: {}",
                    path,
                    idx + 1,
                    e
                ))
            })
        })
        .collect()
}

fn append_document(path: &Path, document: &Document) -> Result<()> {
    let mut line = serde_json::to_string(document)?;
    line.push('\n');

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| CacheError::io(path, e))?;
    append_or_truncate(&mut file, path, |file| {
        file.write_all(line.as_bytes())?;
        file.sync_data()
    })
}

/// Run `write` against the end of `file`, cutting the file back to its
/// previous length if the write fails partway
fn append_or_truncate<F>(file: &mut File, path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> std::io::Result<()>,
{
    let previous_len = file
        .metadata()
        .map_err(|e| CacheError::io(path, e))?
        .len();

    if let Err(e) = write(file) {
        if let Err(truncate_err) = file.set_len(previous_len) {
            warn!("Failed to roll back partial write to {:?}: {}", path, truncate_err);
        }
        return Err(CacheError::io(path, e));
    }

    Ok(())
}
