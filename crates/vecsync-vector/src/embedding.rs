//! Embedding client for generating vector representations
//!
//! Supports OpenAI and Ollama embedding APIs. Failures are classified as
//! transient (network, rate limit, server errors) or permanent so the
//! pipeline's retry policy knows what is worth retrying.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vecsync_core::{EmbeddingConfig, EmbeddingProvider, Result, VecsyncError};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

// ============================================================================
// Embedding Trait
// ============================================================================

/// Trait for embedding generation
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate the embedding for one text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of the vectors this client produces
    fn dimension(&self) -> usize;
}

fn build_http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| VecsyncError::ConfigError(format!("Failed to build HTTP client: {e}")))
}

fn request_error(provider: &str, err: reqwest::Error) -> VecsyncError {
    // Anything that failed before a response arrived is worth retrying
    VecsyncError::provider_transient(format!("{provider} embedding request failed: {err}"))
}

fn status_error(provider: &str, status: StatusCode, body: String) -> VecsyncError {
    let transient = status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error();

    VecsyncError::ProviderError {
        message: format!("{provider} embedding error ({status}): {body}"),
        transient,
    }
}

// ============================================================================
// OpenAI Embedding Client
// ============================================================================

/// OpenAI embedding API client
pub struct OpenAiEmbedding {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedding {
    /// Native output size of known OpenAI models
    pub fn known_dimension(model: &str) -> Option<usize> {
        match model {
            "text-embedding-3-small" => Some(1536),
            "text-embedding-3-large" => Some(3072),
            "text-embedding-ada-002" => Some(1536),
            _ => None,
        }
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| VecsyncError::ConfigError("OpenAI API key required".to_string()))?;

        let base_url = config
            .openai_base_url
            .clone()
            .unwrap_or_else(|| OPENAI_BASE_URL.to_string());

        Ok(Self {
            client: build_http_client(config.timeout_secs)?,
            api_key: api_key.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: Self::known_dimension(&config.model).unwrap_or(config.dimension),
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = OpenAiEmbeddingRequest {
            input: text,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error("OpenAI", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error("OpenAI", status, error_text));
        }

        let result: OpenAiEmbeddingResponse = response.json().await.map_err(|e| {
            VecsyncError::provider_permanent(format!("Failed to parse embedding response: {e}"))
        })?;

        result
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| VecsyncError::provider_permanent("No embedding returned"))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Ollama Embedding Client
// ============================================================================

/// Ollama embedding API client
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    /// Native output size of common Ollama embedding models
    pub fn known_dimension(model: &str) -> Option<usize> {
        match model {
            "nomic-embed-text" => Some(768),
            "mxbai-embed-large" => Some(1024),
            "all-minilm" => Some(384),
            _ => None,
        }
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config.timeout_secs)?,
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: Self::known_dimension(&config.model).unwrap_or(config.dimension),
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error("Ollama", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error("Ollama", status, error_text));
        }

        let result: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            VecsyncError::provider_permanent(format!("Failed to parse embedding response: {e}"))
        })?;

        Ok(result.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an embedding client from config.
///
/// The client's output dimension must equal the configured collection
/// dimension; a mismatch is a configuration error.
pub fn create_embedding_client(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingClient>> {
    let client: Box<dyn EmbeddingClient> = match config.provider {
        EmbeddingProvider::OpenAI => Box::new(OpenAiEmbedding::from_config(config)?),
        EmbeddingProvider::Ollama => Box::new(OllamaEmbedding::from_config(config)?),
    };

    if client.dimension() != config.dimension {
        return Err(VecsyncError::ConfigError(format!(
            "Model {} produces {}-dimensional vectors but the configured dimension is {}",
            config.model,
            client.dimension(),
            config.dimension
        )));
    }

    Ok(client)
}

// ============================================================================
// Tests
// ============================================================================
