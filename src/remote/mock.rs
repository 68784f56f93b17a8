/// In-memory remote index for tests.
use std::sync::Mutex;

use super::{NO_DESCRIPTION, RemoteIndex, SearchResponse, StructuredRecord};
use crate::error::RagError;

/// Returns a fixed record list for every query, or fails every query.
#[derive(Default)]
pub struct StaticIndex {
    records: Vec<StructuredRecord>,
    total_hits: Option<u64>,
    failure: Option<String>,
    queries: Mutex<Vec<String>>,
}

impl StaticIndex {
    #[must_use]
    pub fn new(records: Vec<StructuredRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    /// An index whose every search is a transport failure.
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_total_hits(mut self, total_hits: u64) -> Self {
        self.total_hits = Some(total_hits);
        self
    }

    /// Queries received so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl RemoteIndex for StaticIndex {
    fn search(
        &self,
        query: &str,
        _fields: &[String],
        max_rows: usize,
    ) -> Result<SearchResponse, RagError> {
        self.queries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(query.to_string());

        if let Some(message) = &self.failure {
            return Err(RagError::Transport(message.clone()));
        }

        Ok(SearchResponse {
            total_hits: self.total_hits.unwrap_or(self.records.len() as u64),
            records: self.records.iter().take(max_rows).cloned().collect(),
        })
    }
}

/// A record with the given title and predictable remaining fields.
#[must_use]
pub fn record(title: &str) -> StructuredRecord {
    StructuredRecord {
        title: title.to_string(),
        author: format!("Author of {title}"),
        description: NO_DESCRIPTION.to_string(),
        publish_date: "2020-01-01".to_string(),
        url: format!("https://bdtd.example/{}", title.replace(' ', "-")),
        collection_tag: "TEST".to_string(),
    }
}
