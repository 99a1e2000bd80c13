mod openai;

use std::future::Future;
use std::pin::Pin;

use neo_common::config::{EmbeddingConfig, RetryConfig};

/// Client for computing sentence embeddings via an OpenAI-compatible
/// `/embeddings` endpoint (a local text-embeddings server works the same
/// way). Vectors are unit-normalized before they leave this module, so
/// downstream cosine similarity reduces to a dot product.
pub struct EmbeddingClient {
    http: reqwest::Client,
    config: EmbeddingConfig,
    retry: RetryConfig,
    api_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Embedding API HTTP error: {0}")]
    Http(String),

    #[error("Embedding API auth error: {0}")]
    Auth(String),

    #[error("Embedding API rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: u32, got: usize },

    #[error("Embedding API error: {0}")]
    Api(String),
}

impl EmbeddingError {
    fn is_non_retryable(&self) -> bool {
        matches!(
            self,
            EmbeddingError::Auth(_) | EmbeddingError::DimensionMismatch { .. }
        )
    }
}

impl EmbeddingClient {
    /// Reads the API key from the configured env var. Returns None when the
    /// key is missing and the endpoint is the hosted default — the semantic
    /// response cache then degrades to a permanent miss. A non-default base
    /// URL (local embedding server) needs no key.
    pub fn new(http: reqwest::Client, config: EmbeddingConfig, retry: RetryConfig) -> Option<Self> {
        let api_key = std::env::var(&config.api_key_env).unwrap_or_default();
        if api_key.is_empty() && config.base_url.contains("api.openai.com") {
            tracing::warn!(
                env_var = %config.api_key_env,
                "Embedding API key not set — semantic response cache disabled"
            );
            return None;
        }

        Some(Self {
            http,
            config,
            retry,
            api_key,
        })
    }

    pub fn dimensions(&self) -> u32 {
        self.config.dimensions
    }

    /// Embed a single text, unit-normalized.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let input = [text.to_string()];
        let mut attempt = 0u32;
        let mut backoff_ms = self.retry.initial_backoff_ms;

        loop {
            attempt += 1;
            match openai::call_embeddings(
                &self.http,
                &self.config.base_url,
                &self.api_key,
                &self.config.model,
                self.config.dimensions,
                &input,
            )
            .await
            {
                Ok(mut embeddings) => {
                    let mut vector = embeddings
                        .pop()
                        .ok_or_else(|| EmbeddingError::Api("Empty embeddings response".into()))?;
                    normalize(&mut vector);
                    return Ok(vector);
                }
                Err(e) if e.is_non_retryable() => {
                    metrics::counter!("embedding.api.errors").increment(1);
                    return Err(e);
                }
                Err(EmbeddingError::RateLimited { retry_after }) => {
                    if attempt >= self.retry.max_attempts {
                        metrics::counter!("embedding.api.errors").increment(1);
                        return Err(EmbeddingError::RateLimited { retry_after });
                    }
                    let wait = retry_after.map(|s| s * 1000).unwrap_or(backoff_ms);
                    tracing::warn!(attempt, wait_ms = wait, "Embedding API rate limited, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(wait)).await;
                }
                Err(e) => {
                    if attempt >= self.retry.max_attempts {
                        metrics::counter!("embedding.api.errors").increment(1);
                        return Err(e);
                    }
                    tracing::warn!(attempt, error = %e, "Embedding API error, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                    backoff_ms = (backoff_ms as f64 * self.retry.backoff_multiplier) as u64;
                    backoff_ms = backoff_ms.min(self.retry.max_backoff_ms);
                }
            }
        }
    }
}

fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Object-safe embedding trait so cache tests can use a deterministic mock.
pub trait Embedder: Send + Sync {
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, EmbeddingError>> + Send + 'a>>;

    fn dimensions(&self) -> u32;
}

impl Embedder for EmbeddingClient {
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, EmbeddingError>> + Send + 'a>> {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> u32 {
        self.config.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_vector() {
        let mut v = vec![3.0f32, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_vector_alone() {
        let mut v = vec![0.0f32, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }
}
