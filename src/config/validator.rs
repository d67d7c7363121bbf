use crate::config::Config;
use crate::error::{DelveError, Result, ValidationError};

/// Providers reachable through the OpenAI-compatible client
pub const SUPPORTED_PROVIDERS: [&str; 4] = ["gemini", "groq", "openai", "ollama"];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every violation
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_indexing(config, &mut errors);
        Self::validate_ingest(config, &mut errors);
        Self::validate_llm(config, &mut errors);
        Self::validate_research(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DelveError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }

        if config.storage.output_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.output_dir",
                "Output directory cannot be empty",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.vector_top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.vector_top_k",
                "vector_top_k must be greater than 0",
            ));
        }

        if retrieval.keyword_top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.keyword_top_k",
                "keyword_top_k must be greater than 0",
            ));
        }

        if retrieval.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "retrieval.hnsw_ef_search",
                "HNSW ef_search must be greater than 0",
            ));
        }

        if retrieval.enable_reranking && retrieval.reranker_top_n == 0 {
            errors.push(ValidationError::new(
                "retrieval.reranker_top_n",
                "reranker_top_n must be greater than 0 when reranking is enabled",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }
    }

    fn validate_indexing(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.indexing.vector_dim == 0 {
            errors.push(ValidationError::new(
                "indexing.vector_dim",
                "Vector dimension must be greater than 0",
            ));
        }

        if config.indexing.hnsw_ef_construction == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_ef_construction",
                "HNSW ef_construction must be greater than 0",
            ));
        }

        if config.indexing.hnsw_m == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_m",
                "HNSW M must be greater than 0",
            ));
        }
    }

    fn validate_ingest(config: &Config, errors: &mut Vec<ValidationError>) {
        let ingest = &config.ingest;

        if ingest.chunk_size == 0 {
            errors.push(ValidationError::new(
                "ingest.chunk_size",
                "Chunk size must be greater than 0",
            ));
        } else if ingest.chunk_overlap >= ingest.chunk_size {
            errors.push(ValidationError::new(
                "ingest.chunk_overlap",
                format!(
                    "Chunk overlap ({}) must be smaller than chunk size ({})",
                    ingest.chunk_overlap, ingest.chunk_size
                ),
            ));
        }

        if ingest.extensions.is_empty() {
            errors.push(ValidationError::new(
                "ingest.extensions",
                "At least one file extension is required",
            ));
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        // Credentials are checked when the client is built, so that
        // `config validate` works on machines without the key exported.
        let temp = config.llm.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        let provider = &config.llm.provider;
        if !SUPPORTED_PROVIDERS.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "llm.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    SUPPORTED_PROVIDERS, provider
                ),
            ));
        }

        if config.llm.model.is_empty() {
            errors.push(ValidationError::new(
                "llm.model",
                "Model name cannot be empty",
            ));
        }

        if config.llm.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "llm.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }
    }

    fn validate_research(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.research.max_listed_sources == 0 {
            errors.push(ValidationError::new(
                "research.max_listed_sources",
                "max_listed_sources must be greater than 0",
            ));
        }

        if config.research.agent_version.trim().is_empty() {
            errors.push(ValidationError::new(
                "research.agent_version",
                "Agent version cannot be empty",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_provider() {
        let mut config = Config::default();
        config.llm.provider = "invalid".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = Config::default();
        config.ingest.chunk_overlap = config.ingest.chunk_size;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = Config::default();
        config.retrieval.vector_top_k = 0;
        config.embedding.batch_size = 0;
        config.llm.temperature = 5.0;

        match ConfigValidator::validate(&config) {
            Err(DelveError::ConfigValidation { errors }) => {
                assert_eq!(errors.len(), 3);
                assert!(errors.iter().any(|e| e.path == "llm.temperature"));
            }
            other => panic!("Expected validation failure, got {:?}", other),
        }
    }
}
