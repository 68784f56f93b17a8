//! Local document ingestion: extraction, fixed-size chunking, tokenization
//! and per-collection index builds.
pub mod chunker;
pub mod collection;
pub mod extract;
pub mod tokenizer;

pub use chunker::{Chunk, chunk_document};
pub use collection::{CollectionBuild, Document, load_collection};
pub use extract::{DocumentExtractor, TextExtractor};
pub use tokenizer::tokenize;
