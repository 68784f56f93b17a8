use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use super::chunker::{Chunk, chunk_document};
use super::extract::TextExtractor;
use crate::config::CollectionConfig;
use crate::error::RagError;
use crate::lexical::{Bm25Index, Bm25Params};

/// A loaded document, owned by the collection that read it.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// File name within the collection directory.
    pub id: String,
    pub text: String,
    pub collection: String,
}

/// Chunks of one collection plus the BM25 index built from exactly those chunks.
///
/// `index` is `None` when the collection produced no chunks.
#[derive(Debug)]
pub struct CollectionBuild {
    pub name: String,
    pub chunks: Vec<Chunk>,
    pub index: Option<Bm25Index>,
    pub document_count: usize,
}

impl CollectionBuild {
    #[must_use]
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            chunks: Vec::new(),
            index: None,
            document_count: 0,
        }
    }

    /// The index, or `IndexUnavailable` if the collection has no chunks.
    pub fn require_index(&self) -> Result<&Bm25Index, RagError> {
        self.index
            .as_ref()
            .ok_or_else(|| RagError::IndexUnavailable(self.name.clone()))
    }
}

/// Lists the documents directly inside `dir` whose extension is one of
/// `extensions`, sorted by file name. A missing directory yields nothing.
pub fn list_documents(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let pattern = format!(
        "{}/*",
        glob::Pattern::escape(&dir.to_string_lossy()).trim_end_matches(['/', '\\'])
    );
    let entries = match glob::glob(&pattern) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("invalid collection path {}: {e}", dir.display());
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .filter(|p| p.is_file() && has_extension(p, extensions))
        .collect();
    files.sort();
    files
}

/// Number of documents a collection would index.
pub fn count_documents(dir: &Path, extensions: &[String]) -> usize {
    list_documents(dir, extensions).len()
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext))
}

/// Reads every document of a collection, chunks it and builds the index.
///
/// Always a full rebuild. Unreadable documents contribute zero chunks; the only
/// error is a precondition violation (`chunk_size == 0`).
pub fn load_collection(
    collection: &CollectionConfig,
    chunk_size: usize,
    params: Bm25Params,
    extractor: &dyn TextExtractor,
) -> Result<CollectionBuild, RagError> {
    if chunk_size == 0 {
        return Err(RagError::Precondition(
            "chunk_size must be positive".to_string(),
        ));
    }

    let dir = Path::new(&collection.path);
    if !dir.is_dir() {
        warn!(
            "collection {} has no document directory: {}",
            collection.name,
            dir.display()
        );
        return Ok(CollectionBuild::empty(&collection.name));
    }

    let started = Instant::now();
    let files = list_documents(dir, &collection.extensions);
    let mut chunks = Vec::new();

    for path in &files {
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let document = Document {
            id,
            text: extractor.extract_text(path),
            collection: collection.name.clone(),
        };
        let doc_chunks = chunk_document(&document, chunk_size)?;
        debug!("{}: {} chunks", document.id, doc_chunks.len());
        chunks.extend(doc_chunks);
    }

    let index = if chunks.is_empty() {
        None
    } else {
        let token_lists: Vec<Vec<&str>> = chunks
            .iter()
            .map(|c| c.tokens.iter().map(String::as_str).collect())
            .collect();
        Some(Bm25Index::build_with_params(&token_lists, params))
    };

    info!(
        "Indexed collection {}: {} documents, {} chunks in {:?}",
        collection.name,
        files.len(),
        chunks.len(),
        started.elapsed()
    );

    Ok(CollectionBuild {
        name: collection.name.clone(),
        chunks,
        index,
        document_count: files.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::extract::DocumentExtractor;
    use std::fs;
    use tempfile::tempdir;

    fn collection_at(path: &Path) -> CollectionConfig {
        CollectionConfig {
            name: "preservacao".to_string(),
            label: "Digital preservation".to_string(),
            path: path.to_string_lossy().to_string(),
            top_k: 10,
            extensions: vec!["txt".to_string(), "md".to_string()],
        }
    }

    #[test]
    fn test_missing_directory_yields_empty_build() {
        let build = load_collection(
            &collection_at(Path::new("/nonexistent/collection")),
            1200,
            Bm25Params::default(),
            &DocumentExtractor,
        )
        .unwrap();
        assert!(build.chunks.is_empty());
        assert!(build.index.is_none());
        assert!(matches!(
            build.require_index(),
            Err(RagError::IndexUnavailable(_))
        ));
    }

    #[test]
    fn test_empty_directory_yields_empty_build() {
        let dir = tempdir().unwrap();
        let build = load_collection(
            &collection_at(dir.path()),
            1200,
            Bm25Params::default(),
            &DocumentExtractor,
        )
        .unwrap();
        assert!(build.chunks.is_empty());
        assert!(build.index.is_none());
        assert_eq!(build.document_count, 0);
    }

    #[test]
    fn test_load_chunks_sorted_documents() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "segundo documento").unwrap();
        fs::write(dir.path().join("a.md"), "primeiro documento sobre acervos").unwrap();
        fs::write(dir.path().join("ignored.csv"), "x,y").unwrap();

        let build = load_collection(
            &collection_at(dir.path()),
            10,
            Bm25Params::default(),
            &DocumentExtractor,
        )
        .unwrap();
        assert_eq!(build.document_count, 2);
        assert_eq!(build.chunks[0].document_id, "a.md");
        assert_eq!(build.chunks.last().unwrap().document_id, "b.txt");
        let index = build.index.as_ref().unwrap();
        assert_eq!(index.len(), build.chunks.len());
    }

    #[test]
    fn test_unreadable_document_contributes_nothing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("ok.txt"), "texto legível").unwrap();
        fs::write(dir.path().join("bad.pdf"), b"not a pdf").unwrap();

        let mut collection = collection_at(dir.path());
        collection.extensions.push("pdf".to_string());
        let build = load_collection(
            &collection,
            1200,
            Bm25Params::default(),
            &DocumentExtractor,
        )
        .unwrap();
        assert_eq!(build.document_count, 2);
        assert_eq!(build.chunks.len(), 1);
        assert_eq!(build.chunks[0].document_id, "ok.txt");
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let dir = tempdir().unwrap();
        let err = load_collection(
            &collection_at(dir.path()),
            0,
            Bm25Params::default(),
            &DocumentExtractor,
        )
        .unwrap_err();
        assert!(matches!(err, RagError::Precondition(_)));
    }

    #[test]
    fn test_length_normalization_follows_params() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("d0.txt"), "t a").unwrap();
        fs::write(dir.path().join("d1.txt"), "t t b c d e f g").unwrap();
        for (name, text) in [("d2.txt", "x"), ("d3.txt", "y"), ("d4.txt", "z")] {
            fs::write(dir.path().join(name), text).unwrap();
        }
        let collection = collection_at(dir.path());

        let default =
            load_collection(&collection, 1200, Bm25Params::default(), &DocumentExtractor).unwrap();
        let top = default.require_index().unwrap().top_k(&["t"], 1);
        assert_eq!(default.chunks[top[0].chunk_index].document_id, "d0.txt");

        let no_length_norm = Bm25Params {
            b: 0.0,
            ..Bm25Params::default()
        };
        let tuned = load_collection(&collection, 1200, no_length_norm, &DocumentExtractor).unwrap();
        let top = tuned.require_index().unwrap().top_k(&["t"], 1);
        assert_eq!(tuned.chunks[top[0].chunk_index].document_id, "d1.txt");
    }

    #[test]
    fn test_count_documents_case_insensitive_extension() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("A.PDF"), b"").unwrap();
        fs::write(dir.path().join("b.pdf"), b"").unwrap();
        fs::write(dir.path().join("c.txt"), b"").unwrap();
        assert_eq!(count_documents(dir.path(), &["pdf".to_string()]), 2);
        assert_eq!(count_documents(Path::new("/nonexistent"), &["pdf".to_string()]), 0);
    }
}
