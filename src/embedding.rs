//! Embedding provider implementations.
//!
//! - **[`OpenAiEmbedder`]**: calls an OpenAI-compatible `/embeddings`
//!   endpoint, batched, with retry and backoff.
//! - **[`HashEmbedder`]** (from `docchat-core`): deterministic and offline.
//!
//! Use [`create_embedder`] to instantiate the provider named in the
//! configuration.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use docchat_core::embedding::{Embedder, HashEmbedder};
use docchat_core::error::EmbeddingError;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{Credentials, EmbeddingConfig, DEFAULT_HASH_DIMS};

/// Delay before retry number `attempt` (1-based): 1s, 2s, 4s … capped at 32s.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

/// Embedding provider for OpenAI-compatible APIs.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    batch_size: usize,
    max_retries: u32,
    retry_base: Duration,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig, credentials: &Credentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: credentials.api_key().to_string(),
            model: config.model.clone(),
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            retry_base: Duration::from_secs(1),
        })
    }

    /// Scale the backoff schedule (tests use milliseconds instead of seconds).
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.retry_base * backoff_delay(attempt).as_secs() as u32;
                debug!(attempt, ?delay, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let result = self.send(&body).await;
            match result {
                Ok(response) => return parse_embedding_response(response, texts.len()),
                Err(e) if e.is_transient() => {
                    warn!(attempt, error = %e, "embedding request failed");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err
            .unwrap_or_else(|| EmbeddingError::Request("embedding failed after retries".into())))
    }

    async fn send(&self, body: &serde_json::Value) -> Result<EmbeddingResponse, EmbeddingError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<EmbeddingResponse>()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))
    }
}

/// Order vectors by their `index` field and check the count.
fn parse_embedding_response(
    response: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut data = response.data;
    if data.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            got: data.len(),
        });
    }
    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index);
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.embed_batch(batch).await?);
        }
        Ok(out)
    }
}

/// Create the [`Embedder`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"openai"` | [`OpenAiEmbedder`] |
/// | `"hash"` | [`HashEmbedder`] |
pub fn create_embedder(
    config: &EmbeddingConfig,
    credentials: &Credentials,
) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config, credentials)?)),
        "hash" => Ok(Arc::new(HashEmbedder::new(
            config.dims.unwrap_or(DEFAULT_HASH_DIMS),
        ))),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
