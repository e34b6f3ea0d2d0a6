/// Retrieval engine: question → query vector → nearest ids → passages.
use std::sync::Arc;

use tracing::{debug, warn};

use crate::embedder::{self, Embedder, EmbedderError};
use crate::error::{RagError, Result};
use crate::store::SharedStore;
use crate::store::models::Passage;

/// Stateless per call; everything it reads lives in the shared store.
#[derive(Clone)]
pub struct Retriever {
    store: SharedStore,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    pub fn new(store: SharedStore, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Up to `k` passages closest to `question`, nearest first.
    ///
    /// An empty or never-created store gives an empty result. Ids the
    /// metadata store can't resolve are dropped.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<Passage>> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidArgument(
                "question must not be empty".to_string(),
            ));
        }
        if k == 0 {
            return Err(RagError::InvalidArgument("k must be positive".to_string()));
        }

        let query = embedder::embed_texts(self.embedder.clone(), vec![question.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EmbedderError::InvalidResponse("no query embedding".to_string()))?;

        let store = self.store.read().await;
        if store.index().is_empty() {
            debug!("nothing indexed yet");
            return Ok(Vec::new());
        }

        let hits = store.index().search(&query, k)?;
        let ids: Vec<u64> = hits.iter().map(|h| h.id).collect();
        let mut resolved = store.metadata().resolve(&ids);

        let passages: Vec<Passage> = hits
            .iter()
            .filter_map(|hit| match resolved.remove(&hit.id) {
                Some(entry) => Some(Passage {
                    document_id: entry.document_id,
                    page_number: entry.page_number,
                    text: entry.text,
                    distance: hit.distance,
                }),
                None => {
                    warn!(id = hit.id, "vector has no metadata entry, skipping");
                    None
                }
            })
            .collect();

        debug!(k, returned = passages.len(), "retrieved passages");
        Ok(passages)
    }
}
