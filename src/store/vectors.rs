/// Append-only exact nearest-neighbor index.
///
/// Vectors live in one flat `Vec<f32>`; the ordinal id of a vector is its
/// position in insertion order. Search is an exhaustive scan under squared
/// Euclidean distance, which is exact for the corpus sizes this targets.
use std::cmp::Ordering;
use std::path::Path;

use tracing::debug;

use super::models::Neighbor;
use super::{read_artifact, write_atomic};
use crate::error::{RagError, Result};

const MAGIC: &[u8; 4] = b"RDXV";
const FORMAT_VERSION: u32 = 1;
// magic + version + dimensions + count
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorIndex {
    dimensions: Option<usize>,
    data: Vec<f32>,
}

impl VectorIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored vectors, which is also the next ordinal id.
    #[must_use]
    pub fn size(&self) -> u64 {
        match self.dimensions {
            Some(d) => (self.data.len() / d) as u64,
            None => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fixed by the first insertion; `None` for a fresh index.
    #[must_use]
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// The stored vector for `id`, if any.
    #[must_use]
    pub fn vector(&self, id: u64) -> Option<&[f32]> {
        let d = self.dimensions?;
        let start = usize::try_from(id).ok()?.checked_mul(d)?;
        self.data.get(start..start + d)
    }

    /// Append `vectors` in order and return their ordinal ids.
    ///
    /// The whole batch is validated before anything is appended.
    pub fn insert_batch(&mut self, vectors: &[Vec<f32>]) -> Result<Vec<u64>> {
        let Some(first) = vectors.first() else {
            return Ok(Vec::new());
        };

        let expected = self.dimensions.unwrap_or(first.len());
        if expected == 0 {
            return Err(RagError::DimensionMismatch {
                expected: 0,
                actual: 0,
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        let start = self.size();
        self.dimensions = Some(expected);
        self.data.reserve(vectors.len() * expected);
        for v in vectors {
            self.data.extend_from_slice(v);
        }

        debug!(start, count = vectors.len(), "appended vectors");
        Ok((start..start + vectors.len() as u64).collect())
    }

    /// Up to `k` nearest vectors to `query`, closest first, ties by id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err(RagError::InvalidArgument("k must be positive".to_string()));
        }
        let Some(d) = self.dimensions else {
            return Ok(Vec::new());
        };
        if self.data.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != d {
            return Err(RagError::DimensionMismatch {
                expected: d,
                actual: query.len(),
            });
        }

        let mut hits: Vec<Neighbor> = self
            .data
            .chunks_exact(d)
            .enumerate()
            .map(|(i, v)| Neighbor {
                id: i as u64,
                distance: squared_l2(query, v),
            })
            .collect();

        hits.sort_by(rank);
        hits.truncate(k);
        Ok(hits)
    }

    /// Drop every vector with id `>= len`. Only used to undo an insert the
    /// pipeline refused to keep.
    pub(crate) fn truncate(&mut self, len: u64) {
        if let Some(d) = self.dimensions {
            let keep = usize::try_from(len).unwrap_or(usize::MAX).saturating_mul(d);
            self.data.truncate(keep);
        }
    }

    /// Read an index artifact. A missing file yields an empty index.
    pub fn load(path: &Path) -> Result<Self> {
        let Some(bytes) = read_artifact(path)? else {
            debug!(path = %path.display(), "no vector index yet, starting empty");
            return Ok(Self::new());
        };
        Self::decode(&bytes).map_err(|detail| RagError::malformed(path, detail))
    }

    /// Write the full index to `path`, replacing it atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.encode())
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.dimensions.unwrap_or(0) as u32).to_le_bytes());
        out.extend_from_slice(&self.size().to_le_bytes());
        for v in &self.data {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    fn decode(bytes: &[u8]) -> std::result::Result<Self, String> {
        if bytes.len() < HEADER_LEN {
            return Err(format!("truncated header ({} bytes)", bytes.len()));
        }
        let (header, body) = bytes.split_at(HEADER_LEN);
        if &header[0..4] != MAGIC {
            return Err("not a vector index file".to_string());
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != FORMAT_VERSION {
            return Err(format!("unsupported format version {version}"));
        }
        let dims = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;
        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&header[12..20]);
        let count = u64::from_le_bytes(count_bytes);

        let expected_len = usize::try_from(count)
            .ok()
            .and_then(|c| c.checked_mul(dims))
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| format!("implausible size: {count} x {dims}"))?;
        if body.len() != expected_len {
            return Err(format!(
                "expected {expected_len} payload bytes for {count} x {dims}, found {}",
                body.len()
            ));
        }

        let data: Vec<f32> = body
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let dimensions = (dims > 0).then_some(dims);
        if dimensions.is_none() && count > 0 {
            return Err(format!("{count} vectors with zero dimensions"));
        }

        Ok(Self { dimensions, data })
    }
}

/// Nearest first, NaN distances after every number, ties by id.
fn rank(a: &Neighbor, b: &Neighbor) -> Ordering {
    match (a.distance.is_nan(), b.distance.is_nan()) {
        (false, false) => a.distance.total_cmp(&b.distance),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    }
    .then(a.id.cmp(&b.id))
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
