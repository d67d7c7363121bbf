//! Retrieval over the passage store
//!
//! Two independent retrievers (tantivy keyword search and HNSW vector search)
//! are merged by [`FusionRetriever`] into one deduplicated candidate list. The
//! [`QueryEngine`] sits on top and turns candidates into an [`Answer`], with or
//! without a language model.

mod backends;
mod deduplication;
mod engine;
mod fusion;
mod node;
mod reranker;

pub use backends::{KeywordRetriever, VectorRetriever};
pub use deduplication::deduplicate_nodes;
pub use engine::{QueryEngine, NO_PASSAGES_FOUND};
pub use fusion::{fuse_lexical_first, FusionRetriever};
pub use node::{Answer, RetrievedNode, FILE_NAME_KEY};
pub use reranker::{RerankError, Reranker};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Embedding generation failed: {0}")]
    EmbeddingError(String),

    #[error("Vector search failed: {0}")]
    VectorSearchError(String),

    #[error("Keyword search failed: {0}")]
    KeywordSearchError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Reranking failed: {0}")]
    RerankingError(String),

    #[error("Answer generation failed: {0}")]
    AnswerError(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// A ranked retrieval strategy
pub trait Retriever: Send + Sync {
    /// Return passages for `query`, best first
    fn retrieve(&self, query: &str) -> Result<Vec<RetrievedNode>, SearchError>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

/// Retrieval plus phrasing: answers a query from the document collection
pub trait AnswerBackend: Send + Sync {
    fn query(&self, text: &str) -> Result<Answer, SearchError>;
}
