//! Configuration management for Delve
//!
//! Loads the TOML configuration, applies profiles and environment overrides,
//! and validates the result. The loaded `Config` is handed to every
//! collaborator at construction time; nothing reads settings from globals.

use crate::error::{DelveError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub indexing: IndexingConfig,
    pub ingest: IngestConfig,
    pub llm: LlmConfig,
    pub research: ResearchConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Passage store and indexes live here
    pub data_dir: PathBuf,
    /// Export artifacts are written here
    pub output_dir: PathBuf,
}

/// How the lexical and semantic retrievers are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Keyword results first, then new vector hits
    Hybrid,
    /// Vector retriever only
    Semantic,
}

impl std::str::FromStr for RetrievalMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hybrid" => Ok(Self::Hybrid),
            "semantic" => Ok(Self::Semantic),
            other => Err(format!(
                "Retrieval mode must be 'hybrid' or 'semantic', got '{}'",
                other
            )),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub mode: RetrievalMode,
    pub vector_top_k: usize,
    pub keyword_top_k: usize,
    pub hnsw_ef_search: usize,
    #[serde(default)]
    pub enable_reranking: bool,
    pub reranker_top_n: usize,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub vector_dim: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_m: usize,
}

/// Chunking configuration for `delve ingest`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Chunk size in words
    pub chunk_size: usize,
    /// Words shared between consecutive chunks
    pub chunk_overlap: usize,
    pub extensions: Vec<String>,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: String,
    pub api_key_env: String,
    pub model: String,
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

/// Research pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    pub enable_query_decomposition: bool,
    /// Number of sources listed in a synthesis block
    pub max_listed_sources: usize,
    /// Version string stamped into JSON exports
    pub agent_version: String,
}

/// Research server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    pub pid_file: PathBuf,
    pub log_file: PathBuf,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_mode: Option<RetrievalMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DelveError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| DelveError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| DelveError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| DelveError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(mode) = overrides.retrieval_mode {
            self.retrieval.mode = mode;
        }
        if let Some(enabled) = overrides.llm_enabled {
            self.llm.enabled = enabled;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: DELVE_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("DELVE_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "LLM__ENABLED" => {
                self.llm.enabled = parse_env(path, value)?;
            }
            "LLM__MODEL" => {
                self.llm.model = value.to_string();
            }
            "LLM__PROVIDER" => {
                self.llm.provider = value.to_string();
            }
            "RETRIEVAL__MODE" => {
                self.retrieval.mode =
                    value
                        .parse()
                        .map_err(|message| DelveError::InvalidConfigValue {
                            path: path.to_string(),
                            message,
                        })?;
            }
            "RETRIEVAL__VECTOR_TOP_K" => {
                self.retrieval.vector_top_k = parse_env(path, value)?;
            }
            "RETRIEVAL__KEYWORD_TOP_K" => {
                self.retrieval.keyword_top_k = parse_env(path, value)?;
            }
            "STORAGE__DATA_DIR" => {
                self.storage.data_dir = PathBuf::from(value);
            }
            "STORAGE__OUTPUT_DIR" => {
                self.storage.output_dir = PathBuf::from(value);
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DelveError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("delve").join("config.toml"))
    }

    /// Directory holding the SQLite passage store
    pub fn store_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.data_dir).join("store")
    }

    /// Directory holding the tantivy keyword index
    pub fn keyword_index_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.data_dir)
            .join("index")
            .join("keywords")
    }

    /// Directory export artifacts are written to
    pub fn output_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.output_dir)
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| DelveError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("~/.delve");

        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: data_dir.clone(),
                output_dir: PathBuf::from("./research_outputs"),
            },
            retrieval: RetrievalConfig {
                mode: RetrievalMode::Hybrid,
                vector_top_k: 10,
                keyword_top_k: 10,
                hnsw_ef_search: 50,
                enable_reranking: false,
                reranker_top_n: 5,
            },
            embedding: EmbeddingConfig {
                model: "bge-small-en-v1.5".to_string(),
                batch_size: 32,
            },
            indexing: IndexingConfig {
                vector_dim: 384,
                hnsw_ef_construction: 200,
                hnsw_m: 16,
            },
            ingest: IngestConfig {
                chunk_size: 512,
                chunk_overlap: 50,
                extensions: vec!["md".to_string(), "txt".to_string()],
            },
            llm: LlmConfig {
                enabled: false,
                provider: "gemini".to_string(),
                api_key_env: "GOOGLE_API_KEY".to_string(),
                model: "gemini-2.5-flash".to_string(),
                temperature: 0.1,
                base_url: None,
                timeout_secs: 120,
            },
            research: ResearchConfig {
                enable_query_decomposition: true,
                max_listed_sources: 3,
                agent_version: "deep_researcher_v1.0".to_string(),
            },
            server: ServerConfig {
                socket_path: data_dir.join("delve.sock"),
                pid_file: data_dir.join("delve.pid"),
                log_file: data_dir.join("logs").join("server.log"),
            },
            profiles: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.retrieval.vector_top_k = 7;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.retrieval.vector_top_k, 7);
        assert_eq!(loaded.retrieval.mode, RetrievalMode::Hybrid);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/delve/config.toml"));
        assert!(matches!(result, Err(DelveError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_apply_profile() {
        let mut config = Config::default();
        config.profiles.insert(
            "offline".to_string(),
            ProfileOverrides {
                retrieval_mode: Some(RetrievalMode::Semantic),
                llm_enabled: Some(false),
                llm_model: None,
            },
        );

        config.apply_profile("offline").unwrap();
        assert_eq!(config.retrieval.mode, RetrievalMode::Semantic);
        assert!(!config.llm.enabled);

        assert!(config.apply_profile("missing").is_err());
    }

    #[test]
    fn test_env_value_parsing() {
        let mut config = Config::default();
        config.set_value_from_env("RETRIEVAL__MODE", "semantic").unwrap();
        config
            .set_value_from_env("RETRIEVAL__KEYWORD_TOP_K", "3")
            .unwrap();
        assert_eq!(config.retrieval.mode, RetrievalMode::Semantic);
        assert_eq!(config.retrieval.keyword_top_k, 3);

        assert!(config.set_value_from_env("LLM__ENABLED", "maybe").is_err());
        assert!(config.set_value_from_env("RETRIEVAL__MODE", "fuzzy").is_err());
    }

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_tilde(Path::new("~/.delve")), home.join(".delve"));
        assert_eq!(
            expand_tilde(Path::new("/tmp/delve")),
            PathBuf::from("/tmp/delve")
        );
    }
}
