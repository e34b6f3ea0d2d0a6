/// Error kinds raised by the indexing and retrieval core.
use std::path::PathBuf;

use thiserror::Error;

use crate::embedder::EmbedderError;

/// Errors returned by the chunker, the two stores, the ingestion pipeline
/// and the retrieval engine.
#[derive(Error, Debug)]
pub enum RagError {
    /// Chunking parameters that would never advance (`overlap >= window`).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("dimension mismatch: index holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Ordinal ids of the vector index and the metadata store no longer line up.
    /// Fatal for the ingestion that detected it; nothing is persisted.
    #[error("index corruption: {0}")]
    IndexCorruption(String),

    #[error("store unavailable at {}: {source}", path.display())]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedderError),
}

impl RagError {
    /// Wrap an I/O failure on one of the durable artifacts.
    pub(crate) fn store(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StoreUnavailable {
            path: path.into(),
            source,
        }
    }

    /// A durable artifact exists but its content can't be decoded.
    pub(crate) fn malformed(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::store(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, detail.into()),
        )
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
