/// Document-text extraction.
///
/// Extraction never aborts indexing: a file that cannot be read is logged and
/// treated as empty, so it contributes zero chunks.
use std::path::Path;

use tracing::{debug, warn};

use crate::error::RagError;

pub trait TextExtractor: Send + Sync {
    /// Return the raw text of the document at `path`, or an empty string if
    /// it cannot be read.
    fn extract_text(&self, path: &Path) -> String;
}

/// Extracts text from PDF, plain-text and markdown files by extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentExtractor;

impl DocumentExtractor {
    pub fn try_extract(&self, path: &Path) -> Result<String, RagError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => extract_pdf(path),
            "txt" | "md" => std::fs::read_to_string(path).map_err(|e| RagError::Extraction {
                path: path.display().to_string(),
                message: e.to_string(),
            }),
            other => Err(RagError::Extraction {
                path: path.display().to_string(),
                message: format!("unsupported extension: {other:?}"),
            }),
        }
    }
}

impl TextExtractor for DocumentExtractor {
    fn extract_text(&self, path: &Path) -> String {
        match self.try_extract(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("{e}");
                String::new()
            }
        }
    }
}

/// Concatenates the text of every readable page. Pages that fail to decode
/// are skipped; only a document that cannot be opened is an error.
fn extract_pdf(path: &Path) -> Result<String, RagError> {
    let doc = lopdf::Document::load(path).map_err(|e| RagError::Extraction {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "extracting {}", path.display());

    let mut text = String::new();
    for page_number in pages.keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(page_text) => text.push_str(&page_text),
            Err(e) => warn!(page = page_number, "skipping page of {}: {e}", path.display()),
        }
    }
    Ok(text)
}
