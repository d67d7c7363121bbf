//! Retrieved passage and answer structures

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata key holding the originating file name
pub const FILE_NAME_KEY: &str = "file_name";

/// A passage returned by a retriever
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedNode {
    /// Stable identity of the passage; fusion deduplicates on this
    pub id: String,

    /// Relevance score in the producing retriever's own scale
    pub score: f32,

    /// Passage text
    pub text: String,

    /// Free-form metadata (file_name, path, position, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl RetrievedNode {
    pub fn new(id: impl Into<String>, score: f32, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            score,
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// File name this passage came from, if recorded
    pub fn file_name(&self) -> Option<&str> {
        self.metadata.get(FILE_NAME_KEY).map(String::as_str)
    }
}

/// Output of an answering backend: response text plus the passages it used
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub response_text: String,
    pub source_nodes: Vec<RetrievedNode>,
}

impl Answer {
    pub fn new(response_text: impl Into<String>, source_nodes: Vec<RetrievedNode>) -> Self {
        Self {
            response_text: response_text.into(),
            source_nodes,
        }
    }
}
