//! # scholarag: Retrieval and Context Arbitration for Academic Q&A
//!
//! Answers questions about theses and dissertations from either a remote
//! bibliographic index (Solr) or local document collections ranked with
//! BM25, and decides per turn whether a follow-up question can reuse the
//! previously assembled context.
//!
//! ## Architecture
//!
//! - **[`config`]** : Configuration loading, validation, and defaults
//! - **[`indexer`]** : Text extraction, fixed-size chunking, tokenization, collection builds
//! - **[`lexical`]** : Okapi BM25 index over collection chunks
//! - **[`cache`]** : TTL memoization of collection builds and remote counts
//! - **[`remote`]** : Remote index trait, Solr client, structured records
//! - **[`llm`]** : Chat-completion trait and OpenAI-compatible client
//! - **[`retriever`]** : Evidence retrieval from the remote or local backend
//! - **[`arbitrator`]** : Fresh retrieval vs. context reuse per turn
//! - **[`assembler`]** : Evidence rendering into the answer context
//! - **[`conversation`]** : Turn log, session persistence, answer pipeline

pub mod arbitrator;
pub mod assembler;
pub mod cache;
pub mod config;
pub mod conversation;
pub mod error;
pub mod indexer;
pub mod lexical;
pub mod llm;
pub mod remote;
pub mod retriever;
