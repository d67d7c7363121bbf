mod keyword_index;
/// Embedding & indexing
///
/// Local embedding generation plus the two indexes behind hybrid retrieval:
/// - EmbeddingProvider trait with the FastEmbed implementation
/// - HNSW for vector similarity search
/// - Tantivy for keyword search
mod provider;
mod vector_index;

pub use keyword_index::{sanitize_query, KeywordIndex, KeywordIndexError, KeywordSearchResult};
pub use provider::{
    resolve_model, EmbeddingError, EmbeddingProvider, FastEmbedProvider, DEFAULT_MODEL,
};
pub use vector_index::{SearchResult, VectorIndex, VectorIndexError};

use crate::config::{EmbeddingConfig, IndexingConfig};
use crate::error::{DelveError, Result};

/// Build the configured embedding provider and check it against the index dimension
pub fn build_provider(
    embedding: &EmbeddingConfig,
    indexing: &IndexingConfig,
) -> Result<FastEmbedProvider> {
    let provider = FastEmbedProvider::new(&embedding.model)
        .map_err(|e| DelveError::Retrieval(e.to_string()))?;

    if provider.dimension() != indexing.vector_dim {
        return Err(DelveError::InvalidConfigValue {
            path: "indexing.vector_dim".to_string(),
            message: format!(
                "model {} produces {}-dimensional vectors, index expects {}",
                embedding.model,
                provider.dimension(),
                indexing.vector_dim
            ),
        });
    }

    Ok(provider)
}
