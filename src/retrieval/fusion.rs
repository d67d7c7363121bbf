//! Lexical-first union of two retriever outputs

use crate::retrieval::{deduplicate_nodes, RetrievedNode, Retriever, SearchError};
use std::sync::Arc;

/// Fuse two ranked lists: lexical results first, then semantic results,
/// deduplicated by node id with first occurrence winning.
///
/// No score blending happens here. A node returned by both retrievers keeps
/// its lexical position and lexical score.
pub fn fuse_lexical_first(
    lexical: Vec<RetrievedNode>,
    semantic: Vec<RetrievedNode>,
) -> Vec<RetrievedNode> {
    deduplicate_nodes(lexical.into_iter().chain(semantic))
}

/// Retriever that merges a lexical and a semantic retriever
///
/// Without a lexical retriever (semantic-only mode) the semantic list is
/// returned untouched.
pub struct FusionRetriever {
    lexical: Option<Arc<dyn Retriever>>,
    semantic: Arc<dyn Retriever>,
}

impl FusionRetriever {
    /// Hybrid retriever: keyword hits take precedence over vector hits
    pub fn hybrid(lexical: Arc<dyn Retriever>, semantic: Arc<dyn Retriever>) -> Self {
        Self {
            lexical: Some(lexical),
            semantic,
        }
    }

    /// Degraded retriever with only the semantic side active
    pub fn semantic_only(semantic: Arc<dyn Retriever>) -> Self {
        Self {
            lexical: None,
            semantic,
        }
    }

    pub fn is_hybrid(&self) -> bool {
        self.lexical.is_some()
    }
}

impl Retriever for FusionRetriever {
    fn retrieve(&self, query: &str) -> Result<Vec<RetrievedNode>, SearchError> {
        let semantic = self.semantic.retrieve(query)?;

        let Some(lexical) = &self.lexical else {
            return Ok(semantic);
        };

        let lexical = lexical.retrieve(query)?;
        tracing::debug!(
            lexical = lexical.len(),
            semantic = semantic.len(),
            "Fusing retrieval results"
        );

        Ok(fuse_lexical_first(lexical, semantic))
    }

    fn name(&self) -> &str {
        if self.is_hybrid() {
            "hybrid"
        } else {
            "semantic"
        }
    }
}
