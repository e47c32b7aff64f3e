//! Embedding client abstraction and the OpenAI-compatible HTTP adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce an embedding for the supplied input.
    #[error("Failed to generate embedding: {0}")]
    GenerationFailed(String),
    /// Provider returned a vector whose size does not match configuration.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension both named vector spaces were created with.
        expected: usize,
        /// Dimension actually produced by the provider.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
///
/// Embedding failures are ingestion-fatal: unlike summarization there is no
/// degraded fallback, because a page without vectors cannot be retrieved.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce a fixed-dimension embedding vector for the supplied text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError>;
}

/// HTTP embedding client speaking the OpenAI embeddings wire format.
pub struct HttpEmbeddingClient {
    pub(crate) http: Client,
    pub(crate) url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) model: String,
    pub(crate) dimension: usize,
}

impl HttpEmbeddingClient {
    /// Construct a client targeting the given embeddings endpoint.
    pub fn new(
        url: String,
        api_key: Option<String>,
        model: String,
        dimension: usize,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().user_agent("pdfkb/embedding").build()?;
        Ok(Self {
            http,
            url,
            api_key,
            model,
            dimension,
        })
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        let payload = json!({
            "model": self.model,
            "input": text,
            "encoding_format": "float",
        });

        let mut request = self.http.post(&self.url).json(&payload);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|error| {
            EmbeddingClientError::GenerationFailed(format!(
                "failed to reach embedding service at {}: {error}",
                self.url
            ))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "embedding request failed: {status}, {body}"
            )));
        }

        let body: EmbeddingResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::GenerationFailed(format!(
                "failed to decode embedding response: {error}"
            ))
        })?;

        let vector = body
            .data
            .into_iter()
            .next()
            .map(|row| row.embedding)
            .ok_or_else(|| {
                EmbeddingClientError::GenerationFailed(
                    "embedding response contained no vectors".to_string(),
                )
            })?;

        if vector.len() != self.dimension {
            return Err(EmbeddingClientError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        Ok(vector)
    }
}
