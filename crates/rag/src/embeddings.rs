//! Query embeddings
//!
//! Uses Ollama's embedding API for generating dense vectors. Documents are
//! embedded at ingestion time elsewhere; only queries are embedded here.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use call_agent_config::RagConfig;

use crate::RagError;

/// Text to dense vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, RagError>;

    /// Embedding dimension
    fn dim(&self) -> usize;
}

/// Ollama embedding configuration
#[derive(Debug, Clone)]
pub struct OllamaEmbeddingConfig {
    /// Ollama API endpoint
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Embedding dimension
    pub embedding_dim: usize,
    pub request_timeout: Duration,
}

impl Default for OllamaEmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            embedding_dim: 768,
            request_timeout: Duration::from_secs(3),
        }
    }
}

impl From<&RagConfig> for OllamaEmbeddingConfig {
    fn from(config: &RagConfig) -> Self {
        Self {
            endpoint: config.embedding_endpoint.trim_end_matches('/').to_string(),
            model: config.embedding_model.clone(),
            embedding_dim: config.vector_dim,
            request_timeout: config.timeout(),
        }
    }
}

/// Request to Ollama embedding API
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

/// Response from Ollama embedding API
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama embedder
pub struct OllamaEmbedder {
    client: Client,
    config: OllamaEmbeddingConfig,
}

impl OllamaEmbedder {
    pub fn new(config: OllamaEmbeddingConfig) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn from_config(config: &RagConfig) -> Result<Self, RagError> {
        Self::new(OllamaEmbeddingConfig::from(config))
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, RagError> {
        let request = EmbedRequest {
            model: &self.config.model,
            input: query,
        };

        let url = format!("{}/api/embed", self.config.endpoint);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("Ollama request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "Ollama embedding failed: {} - {}",
                status, text
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("Failed to parse Ollama response: {}", e)))?;

        let embedding = embed_response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("No embedding returned".to_string()))?;

        Ok(embedding)
    }

    fn dim(&self) -> usize {
        self.config.embedding_dim
    }
}
