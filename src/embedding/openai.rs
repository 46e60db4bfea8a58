//! OpenAI-compatible `/embeddings` client.
//!
//! Works against any endpoint that speaks the same request and response
//! shape (OpenAI, Azure-style proxies, local gateways). The blocking client is
//! built per call so it only ever lives inside the blocking thread pool.

use std::time::Duration;

use serde::Deserialize;

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::ProviderError;

/// Longest slice of an error body kept in [`ProviderError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 240;

pub struct OpenAiEmbeddingProvider {
    api_base: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

impl OpenAiEmbeddingProvider {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            timeout,
        }
    }

    /// Build from config, reading the key from the environment variable named
    /// by `api_key_env`.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, ProviderError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ProviderError::Unavailable(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;
        if config.api_base.trim().is_empty() {
            return Err(ProviderError::Unavailable("embedding.api_base is empty".into()));
        }
        Ok(Self::new(
            config.api_base.as_str(),
            api_key,
            config.model.as_str(),
            Duration::from_millis(config.timeout_ms.max(1)),
        ))
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.api_base)
    }
}

/// Pull the single embedding out of a response body.
fn parse_response(body: &str) -> Result<Vec<f32>, ProviderError> {
    let response: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse response: {e}")))?;
    let mut data = response.data.into_iter();
    match (data.next(), data.next()) {
        (Some(item), None) => Ok(item.embedding),
        (None, _) => Err(ProviderError::InvalidResponse("response has no embeddings".into())),
        (Some(_), Some(_)) => Err(ProviderError::InvalidResponse(
            "response has more than one embedding for one input".into(),
        )),
    }
}

impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build client: {e}")))?;

        let response = client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "input": text,
            }))
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    ProviderError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ProviderError::Request(format!("failed to read response body: {e}")))?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let embedding = parse_response(&body)?;
        tracing::debug!(model = %self.model, dim = embedding.len(), "received embedding");
        Ok(embedding)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
