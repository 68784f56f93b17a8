//! In-memory lexical ranking over collection chunks.
pub mod bm25;

pub use bm25::{Bm25Index, Bm25Params, ScoredChunk};
