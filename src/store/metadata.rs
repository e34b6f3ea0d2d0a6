/// Ordinal-id keyed text metadata, persisted as a JSON document
/// `{"entries": [...]}`.
use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::{DocumentSummary, MetadataEntry};
use super::{read_artifact, write_atomic};
use crate::error::{RagError, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct MetadataFile {
    entries: Vec<MetadataEntry>,
}

/// Metadata entries in arrival order plus an id → position lookup.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    entries: Vec<MetadataEntry>,
    positions: HashMap<u64, usize>,
}

impl MetadataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[MetadataEntry] {
        &self.entries
    }

    #[must_use]
    pub fn last_id(&self) -> Option<u64> {
        self.entries.last().map(|e| e.ordinal_id)
    }

    /// Append entries in order. Ids are assigned by the caller and must keep
    /// increasing; a batch that would break that is rejected whole.
    pub fn append(&mut self, entries: Vec<MetadataEntry>) -> Result<()> {
        let mut prev = self.last_id();
        for e in &entries {
            if prev.is_some_and(|p| e.ordinal_id <= p) {
                return Err(RagError::IndexCorruption(format!(
                    "metadata id {} does not follow {}",
                    e.ordinal_id,
                    prev.unwrap_or_default()
                )));
            }
            prev = Some(e.ordinal_id);
        }

        self.entries.reserve(entries.len());
        for e in entries {
            self.positions.insert(e.ordinal_id, self.entries.len());
            self.entries.push(e);
        }
        Ok(())
    }

    /// Drop every entry past the first `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        let len = len.min(self.entries.len());
        for e in self.entries.drain(len..) {
            self.positions.remove(&e.ordinal_id);
        }
    }

    /// Look up `ids`. Unknown ids are left out rather than reported.
    #[must_use]
    pub fn resolve(&self, ids: &[u64]) -> HashMap<u64, MetadataEntry> {
        ids.iter()
            .filter_map(|id| {
                self.positions
                    .get(id)
                    .map(|&pos| (*id, self.entries[pos].clone()))
            })
            .collect()
    }

    /// One summary per document id, in first-ingested order.
    #[must_use]
    pub fn documents(&self) -> Vec<DocumentSummary> {
        let mut order: Vec<DocumentSummary> = Vec::new();
        let mut slot: HashMap<&str, usize> = HashMap::new();
        let mut pages: HashMap<&str, HashSet<u32>> = HashMap::new();

        for e in &self.entries {
            let idx = *slot.entry(e.document_id.as_str()).or_insert_with(|| {
                order.push(DocumentSummary {
                    document_id: e.document_id.clone(),
                    chunks: 0,
                    pages: 0,
                    first_id: e.ordinal_id,
                });
                order.len() - 1
            });
            order[idx].chunks += 1;
            pages
                .entry(e.document_id.as_str())
                .or_default()
                .insert(e.page_number);
        }

        for summary in &mut order {
            summary.pages = pages.get(summary.document_id.as_str()).map_or(0, HashSet::len);
        }
        order
    }

    /// Read a metadata artifact. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        let Some(bytes) = read_artifact(path)? else {
            debug!(path = %path.display(), "no metadata yet, starting empty");
            return Ok(Self::new());
        };
        let file: MetadataFile = serde_json::from_slice(&bytes)
            .map_err(|e| RagError::malformed(path, format!("invalid metadata JSON: {e}")))?;

        let positions = file
            .entries
            .iter()
            .enumerate()
            .map(|(pos, e)| (e.ordinal_id, pos))
            .collect();
        Ok(Self {
            entries: file.entries,
            positions,
        })
    }

    /// Write all entries to `path`, replacing it atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        #[derive(Serialize)]
        struct Borrowed<'a> {
            entries: &'a [MetadataEntry],
        }
        let data = serde_json::to_vec_pretty(&Borrowed {
            entries: &self.entries,
        })
        .map_err(|e| RagError::malformed(path, format!("failed to encode metadata: {e}")))?;
        write_atomic(path, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(id: u64, doc: &str, page: u32) -> MetadataEntry {
        MetadataEntry {
            ordinal_id: id,
            document_id: doc.to_string(),
            page_number: page,
            text: format!("chunk {id} of {doc}"),
        }
    }

    #[test]
    fn test_append_and_resolve() {
        let mut store = MetadataStore::new();
        store
            .append(vec![entry(0, "a", 1), entry(1, "a", 2), entry(2, "b", 1)])
            .unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.last_id(), Some(2));

        let found = store.resolve(&[2, 0, 42]);
        assert_eq!(found.len(), 2);
        assert_eq!(found[&2].document_id, "b");
        assert_eq!(found[&0].page_number, 1);
        assert!(!found.contains_key(&42));
    }

    #[test]
    fn test_append_rejects_non_increasing_ids() {
        let mut store = MetadataStore::new();
        store.append(vec![entry(0, "a", 1), entry(1, "a", 1)]).unwrap();

        let err = store.append(vec![entry(2, "b", 1), entry(1, "b", 1)]);
        assert!(matches!(err, Err(RagError::IndexCorruption(_))));
        assert_eq!(store.len(), 2, "rejected batch must not be applied");

        assert!(store.append(vec![entry(1, "c", 1)]).is_err());
    }

    #[test]
    fn test_documents_summary() {
        let mut store = MetadataStore::new();
        store
            .append(vec![
                entry(0, "report", 1),
                entry(1, "report", 1),
                entry(2, "report", 3),
                entry(3, "memo", 1),
            ])
            .unwrap();

        let docs = store.documents();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].document_id, "report");
        assert_eq!(docs[0].chunks, 3);
        assert_eq!(docs[0].pages, 2);
        assert_eq!(docs[1].first_id, 3);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");

        let mut store = MetadataStore::new();
        store
            .append(vec![entry(0, "a", 1), entry(1, "b", 4), entry(2, "a", 2)])
            .unwrap();
        store.save(&path).unwrap();

        let loaded = MetadataStore::load(&path).unwrap();
        assert_eq!(loaded.entries(), store.entries());
        assert_eq!(loaded.resolve(&[1])[&1].page_number, 4);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["entries"][1]["ordinal_id"], 1);
        assert_eq!(raw["entries"][1]["document_id"], "b");
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::load(&dir.path().join("nope.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            MetadataStore::load(&path),
            Err(RagError::StoreUnavailable { .. })
        ));
    }
}
