/// Embedding gateway: the opaque text → vector collaborator.
///
/// The core only needs batches of equal-length vectors back in input order;
/// how they are computed is up to the implementation.
pub mod mock;
pub mod ollama;

use std::sync::Arc;

use thiserror::Error;

use crate::config::EmbeddingConfig;

/// Errors that can occur while calling an embedding backend.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("embedding request failed: {0}")]
    RequestFailed(String),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("unknown embedding provider: {0}")]
    UnknownProvider(String),
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`. Calls may block; async callers run them on the blocking
/// thread pool.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedderError::InvalidResponse("empty batch result".to_string()))
    }

    /// Embed multiple text strings into vectors, one per input, same order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}

/// Embed owned texts on the blocking thread pool.
pub async fn embed_texts(
    embedder: Arc<dyn Embedder>,
    texts: Vec<String>,
) -> Result<Vec<Vec<f32>>, EmbedderError> {
    tokio::task::spawn_blocking(move || {
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        embedder.embed_batch(&refs)
    })
    .await
    .map_err(|e| EmbedderError::RequestFailed(format!("embedding task panicked: {e}")))?
}

/// Build the embedder named by `config.provider`.
pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, EmbedderError> {
    match config.provider.as_str() {
        "mock" => Ok(Arc::new(mock::MockEmbedder::new(config.dimensions))),
        "ollama" => Ok(Arc::new(ollama::OllamaEmbedder::new(config)?)),
        other => Err(EmbedderError::UnknownProvider(other.to_string())),
    }
}
