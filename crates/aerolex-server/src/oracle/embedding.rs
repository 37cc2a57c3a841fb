//! Embedding oracle
//!
//! The embedder is a text→vector oracle reached over HTTP. The trait
//! is the seam; the bundled client speaks the Ollama-style
//! `/api/embed` endpoint. Calls are batched to amortize round-trips
//! and retried with exponential backoff on transient failures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use aerolex_common::{AerolexError, Result};

use crate::config::EmbeddingConfig;

/// Base delay between embedding retries; doubles per attempt.
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Text→vector oracle.
#[async_trait]
pub trait EmbeddingOracle: Send + Sync {
    /// Embed a batch of texts, one vector per text, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Fixed dimension of every returned vector.
    fn dimension(&self) -> usize;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| AerolexError::EmbeddingOracle("oracle returned no vector".into()))
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// HTTP client for the embedding service.
pub struct HttpEmbeddingClient {
    http: reqwest::Client,
    config: EmbeddingConfig,
}

impl HttpEmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                AerolexError::EmbeddingOracle(format!("failed to build embedding client: {e}"))
            })?;
        Ok(Self { http, config })
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.config.endpoint.trim_end_matches('/'));
        let request = EmbedRequest {
            model: &self.config.model,
            input: batch,
        };

        // Only the call itself retries; a well-formed but wrong answer
        // (bad dimension, wrong count) will not improve on retry.
        let mut attempt = 0u32;
        let parsed = loop {
            match self.try_once(&url, &request).await {
                Ok(parsed) => break parsed,
                Err(e) if attempt < self.config.max_retries => {
                    let delay = RETRY_BASE_DELAY_MS * (1u64 << attempt.min(10));
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay,
                        error = %e,
                        "Embedding batch failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                },
                Err(e) => return Err(e),
            }
        };

        if parsed.embeddings.len() != batch.len() {
            return Err(AerolexError::EmbeddingOracle(format!(
                "oracle returned {} vectors for {} inputs",
                parsed.embeddings.len(),
                batch.len()
            )));
        }
        for vector in &parsed.embeddings {
            if vector.len() != self.config.dimension {
                return Err(AerolexError::EmbeddingOracle(format!(
                    "vector dimension {} does not match configured {}",
                    vector.len(),
                    self.config.dimension
                )));
            }
        }

        Ok(parsed.embeddings)
    }

    async fn try_once(&self, url: &str, request: &EmbedRequest<'_>) -> Result<EmbedResponse> {
        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AerolexError::EmbeddingOracle(format!(
                "oracle returned {status}: {body}"
            )));
        }

        response.json().await.map_err(|e| {
            AerolexError::EmbeddingOracle(format!("malformed embedding response: {e}"))
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> AerolexError {
        if e.is_timeout() {
            AerolexError::EmbeddingTimeout(self.config.timeout_secs)
        } else {
            AerolexError::EmbeddingOracle(format!("embedding request failed: {e}"))
        }
    }
}

#[async_trait]
impl EmbeddingOracle for HttpEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size.max(1)) {
            let mut batch_vectors = self.embed_batch(batch).await?;
            vectors.append(&mut batch_vectors);
        }
        debug!(texts = texts.len(), "Embedded texts");
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}
