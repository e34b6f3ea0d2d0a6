use serde::{Deserialize, Serialize};

/// One page of extracted document text. `page_number` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub page_number: u32,
    pub text: String,
}

impl Page {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }
}

/// Text metadata for the vector with the same ordinal id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub ordinal_id: u64,
    pub document_id: String,
    pub page_number: u32,
    pub text: String,
}

/// A nearest-neighbor hit: ordinal id and squared Euclidean distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: u64,
    pub distance: f32,
}

/// A retrieved source passage, in distance order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    pub document_id: String,
    pub page_number: u32,
    pub text: String,
    pub distance: f32,
}

/// Per-document rollup of the metadata store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub chunks: usize,
    pub pages: usize,
    pub first_id: u64,
}
