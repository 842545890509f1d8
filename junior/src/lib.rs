//! Settings loading and the fastembed adapter behind the `junior` command-line driver

pub mod embedding;
pub mod settings;

pub use embedding::FastEmbedProvider;
pub use settings::{EmbedderKind, Settings};

/// Parse a command-line value as JSON, storing anything else as a JSON string
pub fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}
