//! OpenAI-compatible HTTP provider.
//!
//! Talks to any server exposing the `/chat/completions` and `/embeddings`
//! endpoints (OpenAI, vLLM, Ollama's compatibility layer, LiteLLM proxies).
//!
//! # Environment Variables
//!
//! - `OPENAI_API_KEY`: bearer token (optional for local servers)
//! - `OPENAI_BASE_URL`: API base (default: `https://api.openai.com/v1`)
//! - `NEON_SOUL_CHAT_MODEL`: chat model (default: `gpt-4o-mini`)
//! - `NEON_SOUL_EMBEDDING_MODEL`: embedding model (default: `text-embedding-3-small`)

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{EmbeddingProvider, LlmProvider};
use crate::error::ProviderError;
use crate::vector;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Chat and embedding client for an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    base_url: String,
    api_key: Option<String>,
    chat_model: String,
    embedding_model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    /// Create a provider with explicit settings.
    ///
    /// The HTTP client carries its own transport timeout; the pipeline
    /// applies the configured per-call timeout on top.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Config(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
            temperature: 0.2,
            client,
        })
    }

    /// Create a provider from environment variables.
    pub fn from_env(timeout: Duration) -> Result<Self, ProviderError> {
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        let chat_model = std::env::var("NEON_SOUL_CHAT_MODEL")
            .unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string());
        let embedding_model = std::env::var("NEON_SOUL_EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());
        if api_key.is_none() && base_url == DEFAULT_BASE_URL {
            return Err(ProviderError::Config(
                "OPENAI_API_KEY not set. Set it or point OPENAI_BASE_URL at a local server."
                    .to_string(),
            ));
        }
        Self::new(base_url, api_key, chat_model, embedding_model, timeout)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Build the chat completion request body.
    pub fn build_chat_body(&self, prompt: &str) -> Value {
        serde_json::json!({
            "model": self.chat_model,
            "temperature": self.temperature,
            "messages": [
                { "role": "user", "content": prompt }
            ]
        })
    }

    /// Build the embedding request body.
    pub fn build_embedding_body(&self, text: &str) -> Value {
        serde_json::json!({
            "model": self.embedding_model,
            "input": text,
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        let endpoint = format!("{}/{}", self.base_url, path);
        let mut request = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json");
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(ProviderError::Http(format!("{} from {}", status, endpoint)));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::Config(format!("authentication failed ({})", status)));
        }
        if status.is_client_error() {
            return Err(ProviderError::Malformed(format!(
                "API error ({}): {}",
                status,
                excerpt(&text)
            )));
        }

        serde_json::from_str(&text).map_err(|e| {
            ProviderError::Malformed(format!(
                "invalid JSON: {} - Body: {}",
                e,
                excerpt(&text)
            ))
        })
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(500).collect()
}

/// Extract the assistant text from a chat completion response.
pub fn parse_chat_response(response: &Value) -> Result<String, ProviderError> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| ProviderError::Malformed("missing choices[0].message.content".to_string()))
}

/// Extract and normalize the first embedding from an embeddings response.
pub fn parse_embedding_response(response: &Value) -> Result<Vec<f32>, ProviderError> {
    let raw = response["data"][0]["embedding"]
        .as_array()
        .ok_or_else(|| ProviderError::Malformed("missing data[0].embedding".to_string()))?;
    let values: Vec<f32> = raw
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect::<Option<_>>()
        .ok_or_else(|| ProviderError::Malformed("non-numeric embedding component".to_string()))?;
    vector::normalize(&values)
        .ok_or_else(|| ProviderError::Malformed("zero-magnitude embedding".to_string()))
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn model(&self) -> &str {
        &self.chat_model
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        log::debug!(
            "OpenAiCompatibleProvider.generate: model={}, prompt_len={}",
            self.chat_model,
            prompt.len()
        );
        let body = self.build_chat_body(prompt);
        let response = self.post("chat/completions", &body).await?;
        parse_chat_response(&response)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatibleProvider {
    fn model(&self) -> &str {
        &self.embedding_model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let body = self.build_embedding_body(text);
        let response = self.post("embeddings", &body).await?;
        parse_embedding_response(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(
            "http://localhost:11434/v1/",
            None,
            "llama3",
            "nomic-embed-text",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(provider().base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn test_chat_body() {
        let body = provider().build_chat_body("hello");
        assert_eq!(body["model"], "llama3");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
    }

    #[test]
    fn test_embedding_body() {
        let body = provider().build_embedding_body("hello");
        assert_eq!(body["model"], "nomic-embed-text");
        assert_eq!(body["input"], "hello");
    }

    #[test]
    fn test_parse_chat_response() {
        let response = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "  Admit mistakes.\n" } }]
        });
        assert_eq!(parse_chat_response(&response).unwrap(), "Admit mistakes.");
        assert!(parse_chat_response(&serde_json::json!({ "choices": [] })).is_err());
    }

    #[test]
    fn test_parse_embedding_normalizes() {
        let response = serde_json::json!({ "data": [{ "embedding": [3.0, 4.0] }] });
        let v = parse_embedding_response(&response).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_parse_embedding_rejects_zero_vector() {
        let response = serde_json::json!({ "data": [{ "embedding": [0.0, 0.0] }] });
        assert!(matches!(
            parse_embedding_response(&response),
            Err(ProviderError::Malformed(_))
        ));
    }
}
