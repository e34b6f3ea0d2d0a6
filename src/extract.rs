/// Page text sources for the command line.
///
/// The core only ever sees `(page_number, text)` pairs; this module turns
/// files into those. PDFs are read page by page with `lopdf`. Plain text
/// files are split on form feeds, the page separator `pdftotext` emits.
use std::path::Path;

use thiserror::Error;
use tracing::warn;

use crate::store::models::Page;

const PAGE_BREAK: char = '\x0c';

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Load the pages of the file at `path`.
pub fn load_pages(path: &Path) -> Result<Vec<Page>, ExtractError> {
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        pdf_pages(&bytes)
    } else {
        Ok(split_pages(&String::from_utf8_lossy(&bytes)))
    }
}

/// Split text on form feeds into 1-based pages. A trailing form feed does
/// not open an extra page.
pub fn split_pages(text: &str) -> Vec<Page> {
    let body = text.strip_suffix(PAGE_BREAK).unwrap_or(text);
    body.split(PAGE_BREAK)
        .enumerate()
        .map(|(i, t)| Page::new(i as u32 + 1, t))
        .collect()
}

/// One [`Page`] per PDF page. Pages without extractable text come back empty
/// so the page count still matches the document.
pub fn pdf_pages(bytes: &[u8]) -> Result<Vec<Page>, ExtractError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let pages = doc
        .get_pages()
        .into_keys()
        .map(|n| {
            let text = match doc.extract_text(&[n]) {
                Ok(t) => t,
                Err(e) => {
                    warn!(page = n, "no text extracted: {e}");
                    String::new()
                }
            };
            Page::new(n, text)
        })
        .collect();
    Ok(pages)
}
