use std::sync::Arc;

use junior_cache::knowledge::{EmbeddingProvider, KnowledgeBase, SEARCH_RESULT_LIMIT};
use junior_cache::{CacheError, ManualClock, Result};
use serde_json::json;

/// Embedder that maps a fixed set of query strings to known vectors
struct FixedEmbedder;

impl EmbeddingProvider for FixedEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match text {
            "east" => Ok(vec![1.0, 0.0]),
            "nothing" => Ok(vec![0.0, 0.0]),
            other => Err(CacheError::EmbeddingError(format!("no vector for {:?}", other))),
        }
    }

    fn dimension(&self) -> usize {
        2
    }
}

fn knowledge_base() -> KnowledgeBase {
    KnowledgeBase::in_memory(Arc::new(FixedEmbedder), Arc::new(ManualClock::new()))
}

/// Test: three documents rank by cosine similarity to the query
#[test]
fn test_similarity_ranking() {
    let kb = knowledge_base();
    kb.add_document_with_embedding(json!("east"), vec![1.0, 0.0]).unwrap();
    kb.add_document_with_embedding(json!("north"), vec![0.0, 1.0]).unwrap();
    kb.add_document_with_embedding(json!("mostly east"), vec![0.9, 0.1]).unwrap();

    let hits = kb.search("east").unwrap();
    let contents: Vec<_> = hits.iter().map(|h| h.document.content.clone()).collect();
    assert_eq!(contents, vec![json!("east"), json!("mostly east"), json!("north")]);

    assert!((hits[0].score - 1.0).abs() < 1e-9);
    assert!((hits[1].score - 0.9939).abs() < 1e-3);
    assert!(hits[2].score.abs() < 1e-9);
}

/// Test: a zero-norm query is an empty result, not an error
#[test]
fn test_zero_norm_query_returns_empty() {
    let kb = knowledge_base();
    kb.add_document_with_embedding(json!("east"), vec![1.0, 0.0]).unwrap();

    assert!(kb.search("nothing").unwrap().is_empty());
}

/// Test: only the top five documents come back
#[test]
fn test_result_limit() {
    let kb = knowledge_base();
    for i in 0..8 {
        let angle = i as f32 * 0.1;
        kb.add_document_with_embedding(json!(i), vec![angle.cos(), angle.sin()])
            .unwrap();
    }

    let hits = kb.search_by_embedding(&[1.0, 0.0]).unwrap();
    assert_eq!(hits.len(), SEARCH_RESULT_LIMIT);
    let ids: Vec<_> = hits.iter().map(|h| h.document.content.clone()).collect();
    assert_eq!(ids, vec![json!(0), json!(1), json!(2), json!(3), json!(4)]);
}

/// Test: equal scores keep insertion order
#[test]
fn test_ties_keep_insertion_order() {
    let kb = knowledge_base();
    for name in ["first", "second", "third"] {
        kb.add_document_with_embedding(json!(name), vec![2.0, 2.0]).unwrap();
    }

    let hits = kb.search_by_embedding(&[1.0, 1.0]).unwrap();
    let names: Vec<_> = hits.iter().map(|h| h.document.content.clone()).collect();
    assert_eq!(names, vec![json!("first"), json!("second"), json!("third")]);
}

/// Test: zero-norm documents are stored but never ranked
#[test]
fn test_zero_norm_documents_skipped() {
    let kb = knowledge_base();
    kb.add_document_with_embedding(json!("zero"), vec![0.0, 0.0]).unwrap();
    kb.add_document_with_embedding(json!("ok"), vec![0.5, 0.5]).unwrap();

    let hits = kb.search("east").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document.content, json!("ok"));
    assert_eq!(kb.len().unwrap(), 2);
}

/// Test: embeddings that could never be scored are refused at add time
#[test]
fn test_unscorable_embeddings_rejected() {
    let kb = knowledge_base();

    let err = kb
        .add_document_with_embedding(json!("wide"), vec![1.0, 0.0, 0.0])
        .unwrap_err();
    assert!(matches!(err, CacheError::EmbeddingError(_)));

    let err = kb
        .add_document_with_embedding(json!("nan"), vec![f32::NAN, 1.0])
        .unwrap_err();
    assert!(matches!(err, CacheError::EmbeddingError(_)));

    assert!(kb.is_empty().unwrap());
}

/// Test: embedding failures surface to the caller and store nothing
#[test]
fn test_embedding_failure_propagates() {
    let kb = knowledge_base();

    let err = kb.add_document(json!({"text": "unmapped"})).unwrap_err();
    assert!(matches!(err, CacheError::EmbeddingError(_)));
    assert!(kb.is_empty().unwrap());

    assert!(kb.search("unmapped").is_err());
}

/// Test: add_document embeds the document's text field
#[test]
fn test_add_document_uses_text_field() {
    let kb = knowledge_base();
    let doc = kb.add_document(json!({"text": "east", "path": "src/geo.rs"})).unwrap();
    assert_eq!(doc.embedding, vec![1.0, 0.0]);

    let hits = kb.search("east").unwrap();
    assert_eq!(hits[0].document.id, doc.id);
}
