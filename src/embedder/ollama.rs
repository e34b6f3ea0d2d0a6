/// Embedding gateway backed by a local Ollama instance (`POST /api/embed`).
///
/// Transient failures (HTTP 429, 5xx, connection errors) are retried with
/// exponential backoff; other 4xx responses fail immediately.
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Embedder, EmbedderError};
use crate::config::EmbeddingConfig;

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbedderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbedderError::RequestFailed(format!("http client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            max_retries: config.max_retries,
        })
    }

    fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let url = format!("{}/api/embed", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, ?delay, "retrying embedding request");
                thread::sleep(delay);
            }

            let response = match self.client.post(&url).json(&body).send() {
                Ok(r) => r,
                Err(e) => {
                    warn!("embedding request to {url} failed: {e}");
                    last_err = Some(EmbedderError::RequestFailed(format!(
                        "is Ollama running at {}? {e}",
                        self.base_url
                    )));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let parsed: EmbedResponse = response
                    .json()
                    .map_err(|e| EmbedderError::InvalidResponse(e.to_string()))?;
                return Ok(parsed.embeddings);
            }

            let detail = response.text().unwrap_or_default();
            if status.as_u16() == 429 || status.is_server_error() {
                last_err = Some(EmbedderError::RequestFailed(format!("{status}: {detail}")));
                continue;
            }
            return Err(EmbedderError::RequestFailed(format!("{status}: {detail}")));
        }

        Err(last_err.unwrap_or_else(|| {
            EmbedderError::RequestFailed("embedding failed after retries".to_string())
        }))
    }
}

impl Embedder for OllamaEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.request(texts)?;
        check_batch(texts.len(), self.dimensions, &vectors)?;
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// One vector per input, each of the configured width.
fn check_batch(
    expected_count: usize,
    dimensions: usize,
    vectors: &[Vec<f32>],
) -> Result<(), EmbedderError> {
    if vectors.len() != expected_count {
        return Err(EmbedderError::InvalidResponse(format!(
            "expected {expected_count} embeddings, got {}",
            vectors.len()
        )));
    }
    if let Some(v) = vectors.iter().find(|v| v.len() != dimensions) {
        return Err(EmbedderError::InvalidResponse(format!(
            "expected {dimensions}-dimensional embeddings, got {}",
            v.len()
        )));
    }
    Ok(())
}
