use serde::{Deserialize, Serialize};

use super::collection::Document;
use super::tokenizer::tokenize;
use crate::error::RagError;

/// A fixed-size passage of a document plus its lexical tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub document_id: String,
    pub sequence_index: usize,
    pub text: String,
    pub tokens: Vec<String>,
}

/// Splits a document into non-overlapping windows of `chunk_size` characters
/// and tokenizes each one.
pub fn chunk_document(document: &Document, chunk_size: usize) -> Result<Vec<Chunk>, RagError> {
    let windows = split_into_windows(&document.text, chunk_size)?;
    Ok(windows
        .into_iter()
        .enumerate()
        .map(|(sequence_index, text)| Chunk {
            document_id: document.id.clone(),
            sequence_index,
            tokens: tokenize(text),
            text: text.to_string(),
        })
        .collect())
}

/// Splits text into contiguous windows of `chunk_size` chars (not bytes).
/// The last window may be shorter. Empty text yields no windows.
pub fn split_into_windows(content: &str, chunk_size: usize) -> Result<Vec<&str>, RagError> {
    if chunk_size == 0 {
        return Err(RagError::Precondition(
            "chunk_size must be positive".to_string(),
        ));
    }

    let mut windows = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in content.char_indices() {
        if count == chunk_size {
            windows.push(&content[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }

    if start < content.len() {
        windows.push(&content[start..]);
    }

    Ok(windows)
}
