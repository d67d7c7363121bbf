//! Cross-encoder reranking using FastEmbed

use crate::retrieval::RetrievedNode;
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Reranker initialization failed: {0}")]
    InitializationError(String),

    #[error("Reranking failed: {0}")]
    RerankingError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Cross-encoder reranker applied to fused candidates
pub struct Reranker {
    model: Arc<TextRerank>,
    top_n: usize,
}

impl Reranker {
    /// Create a reranker keeping the best `top_n` candidates
    pub fn new(top_n: usize) -> Result<Self, RerankError> {
        tracing::info!("Initializing reranker model (top_n = {})", top_n);

        let init_options =
            RerankInitOptions::new(RerankerModel::BGERerankerBase).with_show_download_progress(false);

        let model = TextRerank::try_new(init_options)
            .map_err(|e| RerankError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            top_n,
        })
    }

    /// Reorder nodes by cross-encoder score and truncate to `top_n`
    ///
    /// Returned nodes carry the reranker score.
    pub fn rerank(
        &self,
        query: &str,
        nodes: Vec<RetrievedNode>,
    ) -> Result<Vec<RetrievedNode>, RerankError> {
        if nodes.is_empty() {
            return Ok(nodes);
        }

        if query.trim().is_empty() {
            return Err(RerankError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        let documents: Vec<&str> = nodes.iter().map(|n| n.text.as_str()).collect();

        let mut results = self
            .model
            .rerank(query, documents, false, None)
            .map_err(|e| RerankError::RerankingError(e.to_string()))?;

        results.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut slots: Vec<Option<RetrievedNode>> = nodes.into_iter().map(Some).collect();
        let reranked = results
            .into_iter()
            .filter_map(|r| {
                let mut node = slots.get_mut(r.index)?.take()?;
                node.score = r.score;
                Some(node)
            })
            .take(self.top_n)
            .collect();

        Ok(reranked)
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }
}
