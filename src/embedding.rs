//! Embedding generation for vector search.
//!
//! Embeddings come from an external Azure OpenAI embeddings deployment; this
//! module is the seam the knowledge base talks through, so stores and tests
//! can substitute their own implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{BrigadeError, Result};

/// Produces vector representations of text.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Batch variant; more efficient than repeated `embed` calls when the
    /// backend supports it.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;
}

/// Azure OpenAI embeddings deployment coordinates.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub deployment: String,
    pub api_key: String,
    pub api_version: String,
}

impl EmbeddingConfig {
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("AZURE_OPENAI_ENDPOINT")
            .map_err(|_| BrigadeError::Config("AZURE_OPENAI_ENDPOINT is not set".into()))?;
        let api_key = std::env::var("AZURE_OPENAI_API_KEY")
            .map_err(|_| BrigadeError::Config("AZURE_OPENAI_API_KEY is not set".into()))?;
        let deployment = std::env::var("AZURE_OPENAI_EMBEDDING_DEPLOYMENT")
            .unwrap_or_else(|_| "text-embedding-ada-002".to_string());
        let api_version = std::env::var("AZURE_OPENAI_API_VERSION")
            .unwrap_or_else(|_| "2024-02-15-preview".to_string());
        Ok(Self {
            endpoint,
            deployment,
            api_key,
            api_version,
        })
    }
}

/// Known deployment names and the dimension each produces.
fn known_dimension(deployment: &str) -> Option<usize> {
    match deployment {
        "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    index: usize,
}

/// Embeddings over an Azure OpenAI embeddings REST deployment.
#[derive(Debug)]
pub struct AzureEmbeddingClient {
    config: EmbeddingConfig,
    dimension: usize,
    http_client: reqwest::Client,
}

impl AzureEmbeddingClient {
    /// Create a client for a known deployment.
    ///
    /// Fails with a configuration error if the deployment's dimension is
    /// unknown; use [`with_dimension`](Self::with_dimension) in that case.
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let dimension = known_dimension(&config.deployment).ok_or_else(|| {
            BrigadeError::Config(format!(
                "unknown embedding deployment '{}'; specify the dimension explicitly",
                config.deployment
            ))
        })?;
        Ok(Self {
            config,
            dimension,
            http_client: reqwest::Client::new(),
        })
    }

    /// Create a client with an explicit dimension.
    ///
    /// If the deployment is a known one, the dimension must match it.
    pub fn with_dimension(config: EmbeddingConfig, dimension: usize) -> Result<Self> {
        if let Some(expected) = known_dimension(&config.deployment) {
            if expected != dimension {
                return Err(BrigadeError::Config(format!(
                    "dimension mismatch: deployment '{}' produces {}-dim vectors but {} was configured",
                    config.deployment, expected, dimension
                )));
            }
        }
        Ok(Self {
            config,
            dimension,
            http_client: reqwest::Client::new(),
        })
    }

    fn embeddings_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.deployment,
            self.config.api_version,
        )
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .http_client
            .post(self.embeddings_url())
            .header("api-key", &self.config.api_key)
            .json(&EmbeddingsRequest { input: texts })
            .send()
            .await
            .map_err(|e| BrigadeError::Embedding(format!("embedding request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(BrigadeError::Embedding(format!(
                "embedding API error {status}: {body_text}"
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| BrigadeError::Embedding(format!("failed to parse embeddings: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(BrigadeError::Embedding(format!(
                "embedding count mismatch: sent {} inputs, got {} vectors",
                texts.len(),
                parsed.data.len()
            )));
        }

        // The API may return vectors out of order; the index field is canonical.
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);

        for datum in &data {
            if datum.embedding.len() != self.dimension {
                return Err(BrigadeError::Embedding(format!(
                    "embedding dimension mismatch: expected {}, got {}",
                    self.dimension,
                    datum.embedding.len()
                )));
            }
        }

        debug!(batch_size = data.len(), dimension = self.dimension, "Generated embeddings");
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for AzureEmbeddingClient {
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let batch = [text.to_string()];
        let mut vectors = self.request_embeddings(&batch).await?;
        vectors
            .pop()
            .ok_or_else(|| BrigadeError::Embedding("empty embedding result".into()))
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request_embeddings(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
