//! Remote structured search index (bibliographic records).
pub mod mock;
pub mod solr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RagError;

pub const UNTITLED: &str = "Untitled";
pub const NOT_INFORMED: &str = "Not informed";
pub const NO_DATE: &str = "N/A";
pub const NO_DESCRIPTION: &str = "No description";
pub const NO_URL: &str = "#";

/// A bibliographic record returned by the remote index.
///
/// Missing fields are filled with placeholders when the record is built, so
/// downstream code never deals with absent values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredRecord {
    pub title: String,
    pub author: String,
    pub description: String,
    pub publish_date: String,
    pub url: String,
    /// Network/institution the record belongs to.
    pub collection_tag: String,
}

impl StructuredRecord {
    /// Convert a raw index document. Multivalued fields are joined with `"; "`.
    #[must_use]
    pub fn from_document(doc: &Map<String, Value>) -> Self {
        let field = |name: &str, placeholder: &str| {
            doc.get(name)
                .and_then(field_text)
                .unwrap_or_else(|| placeholder.to_string())
        };

        Self {
            title: field("title", UNTITLED),
            author: field("author", NOT_INFORMED),
            description: field("description", NO_DESCRIPTION),
            publish_date: field("publishDate", NO_DATE),
            url: field("url", NO_URL),
            collection_tag: field("network_acronym_str", NOT_INFORMED),
        }
    }
}

fn field_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(field_text)
            .collect::<Vec<_>>()
            .join("; "),
        Value::Null | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Raw response of one remote search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub total_hits: u64,
    pub records: Vec<StructuredRecord>,
}

/// Result of a successful remote query; distinct from a transport error.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutcome {
    Records(Vec<StructuredRecord>),
    NoResults,
}

/// Trait for remote structured indexes.
///
/// Implementations must accept the match-all query `*:*`.
pub trait RemoteIndex: Send + Sync {
    fn search(
        &self,
        query: &str,
        fields: &[String],
        max_rows: usize,
    ) -> Result<SearchResponse, RagError>;
}

/// Run `query` and classify the response.
pub fn fetch_records(
    index: &dyn RemoteIndex,
    query: &str,
    fields: &[String],
    max_rows: usize,
) -> Result<RemoteOutcome, RagError> {
    let response = index.search(query, fields, max_rows)?;
    if response.total_hits == 0 || response.records.is_empty() {
        return Ok(RemoteOutcome::NoResults);
    }
    let mut records = response.records;
    records.truncate(max_rows);
    Ok(RemoteOutcome::Records(records))
}

/// Total number of records in the index, via a zero-row match-all probe.
pub fn count_documents(index: &dyn RemoteIndex) -> Result<u64, RagError> {
    Ok(index.search("*:*", &[], 0)?.total_hits)
}
