//! OpenAI-compatible chat completions client

use crate::llm::{LanguageModel, LlmError};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Base URL used when the configuration does not override it
pub fn default_base_url(provider: &str) -> Option<&'static str> {
    match provider {
        "gemini" => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "openai" => Some("https://api.openai.com/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// Blocking client for any `/chat/completions` endpoint
pub struct OpenAiCompatibleClient {
    client: reqwest::blocking::Client,
    config: OpenAiCompatConfig,
    endpoint: String,
}

impl OpenAiCompatibleClient {
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.config.api_key {
            let value = format!("Bearer {}", key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&value).map_err(|e| LlmError::Transport(e.to_string()))?,
            );
        }
        Ok(headers)
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

impl LanguageModel for OpenAiCompatibleClient {
    fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.config.temperature,
        };

        tracing::debug!(endpoint = %self.endpoint, model = %self.config.model, "Sending completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }

        let text = response.text().map_err(|e| LlmError::Transport(e.to_string()))?;
        parse_completion(&text)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

fn status_error(status: u16, body: String) -> LlmError {
    match status {
        401 | 403 => LlmError::AuthFailed(body),
        429 => LlmError::RateLimited(body),
        _ => LlmError::Api { status, body },
    }
}

fn parse_completion(body: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::ResponseParse(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .ok_or_else(|| LlmError::ResponseParse("Missing choices".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_urls() {
        assert_eq!(default_base_url("ollama"), Some("http://localhost:11434/v1"));
        assert!(default_base_url("gemini").unwrap().ends_with("/openai"));
        assert_eq!(default_base_url("acme"), None);
    }

    #[test]
    fn test_endpoint_joins_path() {
        let client = OpenAiCompatibleClient::new(OpenAiCompatConfig {
            base_url: "https://api.openai.com/v1/".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(client.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  deep_researcher \n"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "deep_researcher");

        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(LlmError::ResponseParse(_))
        ));
        assert!(matches!(
            parse_completion("not json"),
            Err(LlmError::ResponseParse(_))
        ));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(status_error(401, String::new()), LlmError::AuthFailed(_)));
        assert!(matches!(status_error(429, String::new()), LlmError::RateLimited(_)));
        assert!(matches!(
            status_error(500, "boom".to_string()),
            LlmError::Api { status: 500, .. }
        ));
    }
}
