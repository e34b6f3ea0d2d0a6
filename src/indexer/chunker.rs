/// Fixed-size overlapping window chunker.
///
/// Windows are measured in characters (Unicode scalar values), never bytes,
/// so a window boundary never splits a multi-byte character.
use crate::error::{RagError, Result};

pub const DEFAULT_WINDOW: usize = 1000;
pub const DEFAULT_OVERLAP: usize = 200;

/// A contiguous slice of page text. `start` and `len` count characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub start: usize,
    pub len: usize,
    pub text: &'a str,
}

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    window: usize,
    overlap: usize,
}

impl Chunker {
    /// Requires `window > overlap >= 0`; anything else would never advance.
    pub fn new(window: usize, overlap: usize) -> Result<Self> {
        if window == 0 {
            return Err(RagError::InvalidConfiguration(
                "chunk window must be positive".to_string(),
            ));
        }
        if overlap >= window {
            return Err(RagError::InvalidConfiguration(format!(
                "chunk overlap ({overlap}) must be smaller than the window ({window})"
            )));
        }
        Ok(Self { window, overlap })
    }

    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    #[must_use]
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance in characters between the starts of consecutive windows.
    #[must_use]
    pub fn step(&self) -> usize {
        self.window - self.overlap
    }

    /// Lazily iterate the windows of `text`. Calling this again restarts.
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            text,
            window: self.window,
            step: self.step(),
            byte_pos: 0,
            char_pos: 0,
            done: text.is_empty(),
        }
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

/// Iterator returned by [`Chunker::chunks`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    window: usize,
    step: usize,
    byte_pos: usize,
    char_pos: usize,
    done: bool,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.byte_pos >= self.text.len() {
            self.done = true;
            return None;
        }

        let rest = &self.text[self.byte_pos..];
        let end = byte_offset(rest, self.window);
        let piece = &rest[..end];
        let chunk = Chunk {
            start: self.char_pos,
            len: piece.chars().count(),
            text: piece,
        };

        // A window that reached the end of the text is the last one: any
        // later window would only repeat a suffix of it.
        if end == rest.len() {
            self.done = true;
        } else {
            self.byte_pos += byte_offset(rest, self.step);
            self.char_pos += self.step;
        }

        Some(chunk)
    }
}

impl std::iter::FusedIterator for Chunks<'_> {}

/// Byte offset of the `n`th character of `s`, or `s.len()` past the end.
fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

/// Split `text` into owned window strings.
pub fn chunk_text(text: &str, window: usize, overlap: usize) -> Result<Vec<String>> {
    let chunker = Chunker::new(window, overlap)?;
    Ok(chunker.chunks(text).map(|c| c.text.to_string()).collect())
}
