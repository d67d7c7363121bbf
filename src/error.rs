use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Delve
#[derive(Error, Debug)]
pub enum DelveError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Language model credentials are required but absent
    #[error("{env_var} not found in environment variables. Export it or set llm.enabled = false to run in retrieval-only mode")]
    MissingCredentials { env_var: String },

    /// The passage store or its indexes have not been built yet
    #[error("Document index not found at {path}. Please run 'delve ingest <dir>' first")]
    IndexNotFound { path: PathBuf },

    /// Retrieval backend failures
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Language model failures
    #[error("Language model error: {0}")]
    Llm(String),

    /// Export failures not covered by IO
    #[error("Export error: {0}")]
    Export(String),

    /// Session related errors
    #[error("Session error: {0}")]
    Session(String),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Server errors
    #[error("Server error: {0}")]
    Server(String),

    /// Server not running
    #[error("Research server is not running")]
    ServerNotRunning,

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for Delve operations
pub type Result<T> = std::result::Result<T, DelveError>;
