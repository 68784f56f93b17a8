//! Evidence retrieval from the remote index or the local collections.
//!
//! Transport, generation and missing-index failures are absorbed here and turn
//! into an empty evidence set. Only precondition violations reach the caller.
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assembler::MAX_RECORDS;
use crate::cache::{CollectionCache, TtlCache};
use crate::config::{BackendKind, CollectionConfig, Config};
use crate::error::RagError;
use crate::indexer::chunker::Chunk;
use crate::indexer::collection::count_documents;
use crate::indexer::tokenizer::tokenize;
use crate::llm::{ChatMessage, Generator, Task};
use crate::remote::{self, RemoteIndex, RemoteOutcome, StructuredRecord};

/// A chunk returned by local retrieval, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub collection: String,
    pub label: String,
    pub chunk: Chunk,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Evidence {
    Record(StructuredRecord),
    Passage(Passage),
}

/// Ranked evidence; empty means nothing was found.
pub type EvidenceSet = Vec<Evidence>;

/// A local collection to search and how many passages to take from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTarget {
    pub name: String,
    pub k: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Remote,
    /// Collections are searched, and their passages concatenated, in this order.
    Local(Vec<LocalTarget>),
}

impl Backend {
    /// Backend for `kind`, with every configured collection and its `top_k`.
    #[must_use]
    pub fn from_config(config: &Config, kind: BackendKind) -> Self {
        match kind {
            BackendKind::Remote => Backend::Remote,
            BackendKind::Local => Backend::Local(
                config
                    .collections
                    .iter()
                    .map(|c| LocalTarget {
                        name: c.name.clone(),
                        k: c.top_k,
                    })
                    .collect(),
            ),
        }
    }
}

/// Number of documents in one local collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionCount {
    pub name: String,
    pub label: String,
    pub documents: usize,
}

const REMOTE_COUNT_KEY: &str = "remote:*:*";

pub struct Retriever {
    generator: Arc<dyn Generator>,
    remote: Arc<dyn RemoteIndex>,
    cache: Arc<CollectionCache>,
    collections: Vec<CollectionConfig>,
    remote_fields: Vec<String>,
    max_rows: usize,
    cache_ttl: Duration,
    count_cache: TtlCache<u64>,
    count_ttl: Duration,
}

impl Retriever {
    pub fn new(
        config: &Config,
        generator: Arc<dyn Generator>,
        remote: Arc<dyn RemoteIndex>,
        cache: Arc<CollectionCache>,
    ) -> Self {
        Self {
            generator,
            remote,
            cache,
            collections: config.collections.clone(),
            remote_fields: config.remote.fields.clone(),
            max_rows: config.remote.max_rows.min(MAX_RECORDS),
            cache_ttl: config.cache_ttl(),
            count_cache: TtlCache::new(),
            count_ttl: config.count_ttl(),
        }
    }

    /// Retrieve ranked evidence for `query` from `backend`.
    pub fn retrieve(&self, query: &str, backend: &Backend) -> Result<EvidenceSet, RagError> {
        match backend {
            Backend::Remote => Ok(self.retrieve_remote(query)),
            Backend::Local(targets) => self.retrieve_local(query, targets),
        }
    }

    fn retrieve_remote(&self, question: &str) -> EvidenceSet {
        if search_terms(question).is_empty() {
            info!("question has no searchable terms, skipping remote search");
            return Vec::new();
        }

        let query = self.synthesize_query(question);
        info!("remote query: {query}");

        match remote::fetch_records(self.remote.as_ref(), &query, &self.remote_fields, self.max_rows) {
            Ok(RemoteOutcome::Records(records)) => {
                info!("remote index returned {} records", records.len());
                records.into_iter().map(Evidence::Record).collect()
            }
            Ok(RemoteOutcome::NoResults) => {
                info!("remote index returned no results");
                Vec::new()
            }
            Err(e) => {
                warn!("remote search failed: {e}");
                Vec::new()
            }
        }
    }

    /// Ask the generator for a field query over title/author, falling back
    /// to a plain OR query built from the question.
    pub fn synthesize_query(&self, question: &str) -> String {
        let messages = [ChatMessage::user(query_prompt(question))];
        match self.generator.complete(Task::QuerySynthesis, &messages) {
            Ok(reply) => {
                let query = reply.trim().trim_matches('`').trim();
                if query.is_empty() || !(query.contains("title") || query.contains("author")) {
                    warn!("unusable synthesized query {query:?}, using fallback");
                    fallback_query(question)
                } else {
                    query.to_string()
                }
            }
            Err(e) => {
                warn!("query synthesis failed, using fallback: {e}");
                fallback_query(question)
            }
        }
    }

    fn retrieve_local(&self, query: &str, targets: &[LocalTarget]) -> Result<EvidenceSet, RagError> {
        let tokens = tokenize(query);
        let mut evidence = Vec::new();

        for target in targets {
            let build = match self.cache.get_or_build(&target.name, self.cache_ttl) {
                Ok(build) => build,
                Err(e) if e.is_degradable() => {
                    warn!("skipping collection {}: {e}", target.name);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let index = match build.require_index() {
                Ok(index) => index,
                Err(e) => {
                    debug!("{e}");
                    continue;
                }
            };

            let label = self
                .cache
                .collection(&target.name)
                .map_or_else(|| target.name.clone(), |c| c.label.clone());
            let top = index.top_k(&tokens, target.k);
            debug!("{}: {} passages", target.name, top.len());

            evidence.extend(top.into_iter().map(|scored| {
                Evidence::Passage(Passage {
                    collection: target.name.clone(),
                    label: label.clone(),
                    chunk: build.chunks[scored.chunk_index].clone(),
                    score: scored.score,
                })
            }));
        }

        Ok(evidence)
    }

    /// Document counts of every configured collection, in configuration order.
    pub fn local_document_counts(&self) -> Vec<CollectionCount> {
        self.collections
            .iter()
            .map(|c| CollectionCount {
                name: c.name.clone(),
                label: c.label.clone(),
                documents: count_documents(Path::new(&c.path), &c.extensions),
            })
            .collect()
    }

    /// Drop cached collection builds and the remote count so the next
    /// request reloads them.
    pub fn reload(&self) {
        info!("reloading collections");
        self.cache.clear();
        self.count_cache.clear();
    }

    /// Total records in the remote index, memoized for the count TTL.
    /// `None` if the probe fails.
    pub fn remote_document_count(&self) -> Option<u64> {
        match self.count_cache.get_or_build(REMOTE_COUNT_KEY, self.count_ttl, || {
            remote::count_documents(self.remote.as_ref())
        }) {
            Ok(count) => Some(*count),
            Err(e) => {
                warn!("remote document count failed: {e}");
                None
            }
        }
    }
}

fn query_prompt(question: &str) -> String {
    format!(
        "Generate a Solr query to find theses or dissertations about the topic:\n\
         \"{question}\"\n\n\
         Use the fields \"title\" and \"author\".\n\
         The query must search both fields combined with the OR operator.\n\
         Return only the query, in the format:\n\
         (title:(terms) OR author:(terms))"
    )
}

/// Question text with Solr syntax characters replaced by spaces.
fn search_terms(question: &str) -> String {
    question
        .chars()
        .map(|c| if is_solr_special(c) { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_solr_special(c: char) -> bool {
    matches!(
        c,
        '+' | '-' | '&' | '|' | '!' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '"' | '~' | '*'
            | '?' | ':' | '\\' | '/'
    )
}

/// `(title:(terms) OR author:(terms))` from the raw question.
pub fn fallback_query(question: &str) -> String {
    let terms = search_terms(question);
    format!("(title:({terms}) OR author:({terms}))")
}
