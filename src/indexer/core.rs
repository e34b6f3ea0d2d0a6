use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::embedder::{self, Embedder, EmbedderError};
use crate::error::{RagError, Result};
use crate::indexer::chunker::Chunker;
use crate::store::SharedStore;
use crate::store::models::{MetadataEntry, Page};

/// Outcome of one [`Indexer::ingest`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Pages in the source document, whether or not they produced chunks.
    pub page_count: usize,
    pub chunk_count: usize,
    /// Ordinal id of the first vector added, `None` when nothing was indexed.
    pub first_id: Option<u64>,
}

/// Ingestion pipeline: chunk → embed → index insert → metadata append → persist.
///
/// Holds the only write path into the shared store. Ingestions are
/// serialised by the store's write lock and, across handles on the same
/// directory, by its [`ArtifactLock`](crate::store::ArtifactLock), so two
/// calls can never read the same starting id.
pub struct Indexer {
    store: SharedStore,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
}

impl Indexer {
    pub fn new(store: SharedStore, embedder: Arc<dyn Embedder>, chunker: Chunker) -> Self {
        Self {
            store,
            embedder,
            chunker,
        }
    }

    /// Index every page of `document_id`.
    ///
    /// Re-ingesting an id appends a second copy; nothing is deduplicated.
    ///
    /// On any error the in-memory store is left as it was on disk before
    /// the call and nothing is retried. A failed flush may still have
    /// written the index file; `alignment_check` reports that.
    pub async fn ingest(&self, document_id: &str, pages: &[Page]) -> Result<IngestReport> {
        if document_id.trim().is_empty() {
            return Err(RagError::InvalidArgument(
                "document id must not be empty".to_string(),
            ));
        }

        let mut report = IngestReport {
            page_count: pages.len(),
            ..IngestReport::default()
        };

        let mut page_numbers = Vec::new();
        let mut texts = Vec::new();
        for page in pages {
            for chunk in self.chunker.chunks(&page.text) {
                page_numbers.push(page.page_number);
                texts.push(chunk.text.to_string());
            }
        }

        if texts.is_empty() {
            info!(document_id, pages = pages.len(), "document has no text, nothing indexed");
            return Ok(report);
        }

        let n = texts.len();
        debug!(document_id, chunks = n, "embedding chunks");
        let vectors = embedder::embed_texts(self.embedder.clone(), texts.clone()).await?;
        if vectors.len() != n {
            return Err(EmbedderError::InvalidResponse(format!(
                "expected {n} embeddings, got {}",
                vectors.len()
            ))
            .into());
        }

        let mut store = self.store.write().await;
        let _artifacts = store.lock_artifacts().await?;
        store.reload()?;
        if !store.alignment_check() {
            warn!(document_id, "ingesting into a store whose index and metadata disagree");
        }

        let start_id = store.index().size();
        let entries_before = store.metadata().len();
        let ids = store.index_mut().insert_batch(&vectors)?;
        if let Err(e) = verify_contiguous(start_id, n, &ids) {
            store.index_mut().truncate(start_id);
            return Err(e);
        }

        let entries: Vec<MetadataEntry> = texts
            .into_iter()
            .zip(page_numbers)
            .enumerate()
            .map(|(i, (text, page_number))| MetadataEntry {
                ordinal_id: start_id + i as u64,
                document_id: document_id.to_string(),
                page_number,
                text,
            })
            .collect();
        if let Err(e) = store.metadata_mut().append(entries) {
            store.index_mut().truncate(start_id);
            return Err(e);
        }

        store.mark_dirty();
        if let Err(e) = store.flush() {
            warn!(document_id, "persisting failed, ingestion discarded: {e}");
            store.discard_since(start_id, entries_before);
            return Err(e);
        }

        report.chunk_count = n;
        report.first_id = Some(start_id);
        info!(
            document_id,
            pages = report.page_count,
            chunks = n,
            first_id = start_id,
            "document ingested"
        );
        Ok(report)
    }
}

/// The index must hand back exactly `start..start + n`.
fn verify_contiguous(start: u64, n: usize, ids: &[u64]) -> Result<()> {
    if ids.len() != n {
        return Err(RagError::IndexCorruption(format!(
            "index returned {} ids for {n} vectors",
            ids.len()
        )));
    }
    if let Some((i, &id)) = ids
        .iter()
        .enumerate()
        .find(|&(i, &id)| id != start + i as u64)
    {
        return Err(RagError::IndexCorruption(format!(
            "expected ordinal id {} at position {i}, index assigned {id}",
            start + i as u64
        )));
    }
    Ok(())
}
