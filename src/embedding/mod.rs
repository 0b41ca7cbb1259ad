//! Embedding capability and backends.
//!
//! The engine never computes vectors itself; it consumes an [`Embedder`]
//! injected by the caller. Batches that fail after bounded retry degrade the
//! affected units to structural-only boundaries; embedding is never required
//! for correctness, only for quality.

mod http;

pub use http::HttpEmbedder;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

/// Retry attempts for one embedding batch before its units are degraded.
pub const EMBED_RETRY_ATTEMPTS: u32 = 3;

/// Initial backoff delay; doubles on each failed attempt.
const INITIAL_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding count mismatch: sent {sent}, received {received}")]
    CountMismatch { sent: usize, received: usize },
}

/// Trait for embedding backends (HTTP services, local models, test stubs).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per input text (in order).
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// The dimensionality of the output vectors.
    fn dimensions(&self) -> usize;
}

/// Call `embed_batch` with bounded retry and exponential backoff.
///
/// A response with the wrong number of vectors is treated like any other
/// failure and retried.
pub(crate) async fn embed_with_retry(
    embedder: &dyn Embedder,
    texts: &[&str],
    attempts: u32,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut delay = INITIAL_BACKOFF;
    let mut last_err = EmbeddingError::Api("no attempts made".to_string());

    for attempt in 1..=attempts.max(1) {
        match embedder.embed_batch(texts).await {
            Ok(vectors) if vectors.len() == texts.len() => return Ok(vectors),
            Ok(vectors) => {
                last_err = EmbeddingError::CountMismatch {
                    sent: texts.len(),
                    received: vectors.len(),
                };
            }
            Err(e) => last_err = e,
        }

        warn!(attempt, error = %last_err, "Embedding batch failed");
        if attempt < attempts {
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }

    Err(last_err)
}
