//! HTTP-backed embedding client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Embedder, EmbeddingError};

/// Client for an HTTP embedding service exposing a `POST /embed` endpoint
/// that accepts `{"texts": [...]}` and returns `{"embeddings": [[f32]]}`.
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl HttpEmbedder {
    /// Create a new embedding client for the given service.
    pub fn new(base_url: &str, dimensions: usize) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            dimensions,
        }
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        self
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embed", self.base_url);
        debug!(batch_size = texts.len(), %url, "Sending embedding batch");

        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest { texts })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api(format!("{status}: {body}")));
        }

        let result: EmbedResponse = response.json().await?;

        for vector in &result.embeddings {
            if vector.len() != self.dimensions {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimensions,
                    actual: vector.len(),
                });
            }
        }

        Ok(result.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
