//! Knowledge base: documents, embeddings and similarity search

pub mod embedding;
pub mod similarity;
pub mod store;

pub use embedding::{EmbeddingProvider, HashEmbedder, DEFAULT_HASH_DIMENSION};
pub use similarity::cosine_similarity;
pub use store::{document_text, Document, KnowledgeBase, SearchHit, SEARCH_RESULT_LIMIT};
