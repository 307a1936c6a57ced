//! Ollama-backed providers.
//!
//! Both providers speak the native Ollama HTTP API: `/api/embeddings` for
//! vectors and `/api/generate` for completions. Timeouts and retry policy
//! belong to Ollama / the caller, not here.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::provider::{EmbeddingProvider, GenerationProvider};
use crate::core::config::OllamaConfig;
use crate::core::errors::RagError;

const PROVIDER_NAME: &str = "ollama";

#[derive(Clone)]
pub struct OllamaEmbeddingProvider {
    base_url: String,
    model: String,
    dimensions: usize,
    client: Client,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbeddingProvider {
    pub fn new(config: &OllamaConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.embedding_model.clone(),
            dimensions: config.embedding_dimensions,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": text,
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::upstream(PROVIDER_NAME, e))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::upstream(
                PROVIDER_NAME,
                format!("embeddings request failed ({status}): {text}"),
            ));
        }

        let payload: EmbeddingsResponse = res
            .json()
            .await
            .map_err(|e| RagError::upstream(PROVIDER_NAME, e))?;

        if payload.embedding.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: payload.embedding.len(),
            });
        }

        Ok(payload.embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Clone)]
pub struct OllamaGenerationProvider {
    base_url: String,
    model: String,
    client: Client,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerationProvider {
    pub fn new(config: &OllamaConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.generation_model.clone(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerationProvider {
    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::upstream(PROVIDER_NAME, e))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::upstream(
                PROVIDER_NAME,
                format!("generate request failed ({status}): {text}"),
            ));
        }

        let payload: GenerateResponse = res
            .json()
            .await
            .map_err(|e| RagError::upstream(PROVIDER_NAME, e))?;

        Ok(payload.response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
