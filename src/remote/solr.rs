//! Solr `select` client.
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::{RemoteIndex, SearchResponse, StructuredRecord};
use crate::config::RemoteConfig;
use crate::error::RagError;

#[derive(Deserialize)]
struct SelectResponse {
    response: SelectBody,
}

#[derive(Deserialize)]
struct SelectBody {
    #[serde(rename = "numFound")]
    num_found: u64,
    #[serde(default)]
    docs: Vec<Map<String, Value>>,
}

pub struct SolrClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl SolrClient {
    pub fn new(config: &RemoteConfig) -> Result<Self, RagError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("scholarag/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn select_url(&self) -> String {
        format!("{}/select", self.base_url)
    }
}

fn parse_select(body: &str) -> Result<SearchResponse, RagError> {
    let parsed: SelectResponse = serde_json::from_str(body)
        .map_err(|e| RagError::Transport(format!("invalid Solr response: {e}")))?;

    Ok(SearchResponse {
        total_hits: parsed.response.num_found,
        records: parsed
            .response
            .docs
            .iter()
            .map(StructuredRecord::from_document)
            .collect(),
    })
}

impl RemoteIndex for SolrClient {
    fn search(
        &self,
        query: &str,
        fields: &[String],
        max_rows: usize,
    ) -> Result<SearchResponse, RagError> {
        let rows = max_rows.to_string();
        let fl = fields.join(",");
        let mut params = vec![("q", query), ("rows", rows.as_str()), ("wt", "json")];
        if !fl.is_empty() {
            params.push(("fl", fl.as_str()));
        }

        debug!(query, rows = max_rows, "Solr select");
        let resp = self.client.get(self.select_url()).query(&params).send()?;

        if !resp.status().is_success() {
            return Err(RagError::Transport(format!(
                "Solr returned status {}",
                resp.status()
            )));
        }

        let body = resp.text()?;
        parse_select(&body)
    }
}
