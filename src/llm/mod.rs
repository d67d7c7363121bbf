//! Language model access
//!
//! A single blocking completion call is all the pipeline needs: answer
//! phrasing in the query engine and tool routing in the agent.

mod openai_compat;

pub use openai_compat::{default_base_url, OpenAiCompatConfig, OpenAiCompatibleClient};

use crate::config::LlmConfig;
use crate::error::{DelveError, Result};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },
    #[error("could not parse completion: {0}")]
    ResponseParse(String),
}

/// A chat-style completion model
pub trait LanguageModel: Send + Sync {
    /// Complete a single system + user exchange
    fn complete(&self, system: &str, user: &str) -> std::result::Result<String, LlmError>;

    fn model_name(&self) -> &str;
}

/// Build the configured language model
///
/// Returns `Ok(None)` when the LLM is disabled or when the client cannot be
/// constructed (the pipeline then runs degraded). A missing API key for an
/// enabled provider that needs one is fatal.
pub fn build_language_model(config: &LlmConfig) -> Result<Option<Arc<dyn LanguageModel>>> {
    if !config.enabled {
        tracing::info!("LLM disabled, running in retrieval-only mode");
        return Ok(None);
    }

    let api_key = std::env::var(&config.api_key_env)
        .ok()
        .filter(|k| !k.trim().is_empty());

    if api_key.is_none() && config.provider != "ollama" {
        return Err(DelveError::MissingCredentials {
            env_var: config.api_key_env.clone(),
        });
    }

    let Some(base_url) = config
        .base_url
        .clone()
        .or_else(|| default_base_url(&config.provider).map(str::to_string))
    else {
        tracing::warn!(
            "No endpoint known for provider '{}', running without LLM",
            config.provider
        );
        return Ok(None);
    };

    match OpenAiCompatibleClient::new(OpenAiCompatConfig {
        base_url,
        api_key,
        model: config.model.clone(),
        temperature: config.temperature,
        timeout_secs: config.timeout_secs,
    }) {
        Ok(client) => {
            tracing::info!(
                "Using {} model {} at {}",
                config.provider,
                config.model,
                client.endpoint()
            );
            Ok(Some(Arc::new(client)))
        }
        Err(e) => {
            tracing::warn!("Failed to initialize LLM client, running degraded: {}", e);
            Ok(None)
        }
    }
}
