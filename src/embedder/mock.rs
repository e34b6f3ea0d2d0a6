/// Offline embedder for tests and air-gapped use.
///
/// Lowercased words are hashed into a fixed number of buckets (feature
/// hashing), so texts that share words land close to each other.
use std::hash::{DefaultHasher, Hash, Hasher};

use super::{Embedder, EmbedderError};

/// Deterministic bag-of-words vectors, unit length unless the text has no words.
pub struct MockEmbedder {
    pub dimensions: usize,
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn bucket(&self, word: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        (hasher.finish() % self.dimensions as u64) as usize
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut counts = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return counts;
        }

        text.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .for_each(|w| counts[self.bucket(w)] += 1.0);

        let norm = counts.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            counts.iter_mut().for_each(|v| *v /= norm);
        }
        counts
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl Embedder for MockEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
