//! Structured cache keys

use std::fmt;

use crate::cache::types::CacheKey;

/// What a cached value was produced by
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Static/LLM analysis of a source file
    Analysis,

    /// Suggested fix for a reported error
    ErrorFix,

    /// Explanation of a programming concept
    Explanation,

    /// Documentation suggestion
    DocSuggestion,

    /// Custom producer
    Custom(String),
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Analysis => write!(f, "analysis"),
            KeyKind::ErrorFix => write!(f, "error_fix"),
            KeyKind::Explanation => write!(f, "explanation"),
            KeyKind::DocSuggestion => write!(f, "doc_suggestion"),
            KeyKind::Custom(s) => write!(f, "custom:{}", s),
        }
    }
}

/// Builds `kind:identifier?k=v&...` keys
pub struct CacheKeyBuilder {
    kind: KeyKind,
    identifier: String,
    params: Vec<(String, String)>,
}

impl CacheKeyBuilder {
    pub fn new(kind: KeyKind) -> Self {
        Self {
            kind,
            identifier: String::new(),
            params: Vec::new(),
        }
    }

    /// Set the primary identifier (file path, term, error text)
    pub fn identifier(mut self, id: impl Into<String>) -> Self {
        self.identifier = id.into();
        self
    }

    /// Add a parameter to the key; parameters keep insertion order
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn build(self) -> CacheKey {
        let mut key = format!("{}:{}", self.kind, self.identifier);

        if !self.params.is_empty() {
            let params_str: Vec<String> = self
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            key.push('?');
            key.push_str(&params_str.join("&"));
        }

        key
    }
}
