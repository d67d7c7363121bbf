/// Embedding provider trait and FastEmbed implementation
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use thiserror::Error;

/// Model used when the configuration does not name one
pub const DEFAULT_MODEL: &str = "bge-small-en-v1.5";

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Trait for embedding providers
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for multiple texts, one per input, in order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Resolve a configured model name to the FastEmbed model and its dimension
pub fn resolve_model(model_name: &str) -> Result<(EmbeddingModel, usize), EmbeddingError> {
    match model_name.to_lowercase().as_str() {
        "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" | "baai/bge-base-en-v1.5" => Ok((EmbeddingModel::BGEBaseENV15, 768)),
        "bge-large-en-v1.5" | "baai/bge-large-en-v1.5" => Ok((EmbeddingModel::BGELargeENV15, 1024)),
        "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
            Ok((EmbeddingModel::AllMiniLML6V2, 384))
        }
        _ => Err(EmbeddingError::InitializationError(format!(
            "Unsupported model: {}. Supported: bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, all-MiniLM-L6-v2",
            model_name
        ))),
    }
}

/// FastEmbed provider for local embedding generation
///
/// Models are downloaded on first use to the FastEmbed cache directory.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Create a new FastEmbed provider with the specified model
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let (embedding_model, dimension) = resolve_model(model_name)?;

        tracing::info!(
            "Initializing embedding model: {} ({}D, downloaded if not cached)",
            model_name,
            dimension
        );

        let init_options = InitOptions::new(embedding_model).with_show_download_progress(false);

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }

    /// Create provider with the default model
    pub fn with_default_model() -> Result<Self, EmbeddingError> {
        Self::new(DEFAULT_MODEL)
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<(), EmbeddingError> {
        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let mut embeddings = self
            .model
            .embed(vec![text.to_string()], None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        let embedding = embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::GenerationError("No embeddings generated".to_string()))?;

        self.check_dimension(&embedding)?;
        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput(
                "Batch contains empty text".to_string(),
            ));
        }

        let embeddings = self
            .model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::GenerationError(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        for embedding in &embeddings {
            self.check_dimension(embedding)?;
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_model_names() {
        assert_eq!(resolve_model("bge-small-en-v1.5").unwrap().1, 384);
        assert_eq!(resolve_model("BAAI/bge-base-en-v1.5").unwrap().1, 768);
        assert_eq!(resolve_model("all-MiniLM-L6-v2").unwrap().1, 384);
        assert!(resolve_model("word2vec").is_err());
    }

    #[test]
    #[ignore] // Requires model download - run with: cargo test -- --ignored
    fn test_provider_creation() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        assert_eq!(provider.dimension(), 384);
        assert_eq!(provider.model_name(), DEFAULT_MODEL);
    }

    #[test]
    #[ignore] // Requires model download - run with: cargo test -- --ignored
    fn test_batch_embedding() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let texts = vec![
            "Quantum computers use qubits.".to_string(),
            "Photosynthesis converts light to energy.".to_string(),
        ];

        let embeddings = provider.embed_batch(&texts).unwrap();
        assert_eq!(embeddings.len(), 2);
        assert!(embeddings.iter().all(|e| e.len() == 384));
    }

    #[test]
    #[ignore] // Requires model download - run with: cargo test -- --ignored
    fn test_empty_text() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        assert!(provider.embed("   ").is_err());
    }
}
