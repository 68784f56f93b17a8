/// Configuration module for scholarag.
///
/// Handles loading, validating, and providing default configuration values.
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assembler::MAX_RECORDS;
use crate::lexical::Bm25Params;

// ── Default value functions ──────────────────────────────────────────

fn default_chunk_size() -> usize {
    1200
}

fn default_cache_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_top_k() -> usize {
    10
}

fn default_extensions() -> Vec<String> {
    vec!["pdf".to_string()]
}

fn default_collections() -> Vec<CollectionConfig> {
    vec![
        CollectionConfig {
            name: "preservacao".to_string(),
            label: "Digital preservation".to_string(),
            path: "pdfs/Preservação_Digital".to_string(),
            top_k: default_top_k(),
            extensions: default_extensions(),
        },
        CollectionConfig {
            name: "cardio".to_string(),
            label: "Heart disease".to_string(),
            path: "pdfs/Doenca_Cardiaca".to_string(),
            top_k: default_top_k(),
            extensions: default_extensions(),
        },
    ]
}

fn default_solr_url() -> String {
    "https://solr-bdtd.ibict.br/solr/biblio2".to_string()
}

fn default_remote_timeout_secs() -> u64 {
    30
}

fn default_max_rows() -> usize {
    10
}

fn default_fields() -> Vec<String> {
    [
        "title",
        "author",
        "description",
        "publishDate",
        "url",
        "network_acronym_str",
    ]
    .iter()
    .map(|f| f.to_string())
    .collect()
}

fn default_count_ttl_secs() -> u64 {
    12 * 60 * 60
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_small_model() -> String {
    "gpt-4o-mini-2024-07-18".to_string()
}

fn default_answer_model() -> String {
    "gpt-5-mini-2025-08-07".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_count_keywords() -> Vec<String> {
    [
        "quantos pdf",
        "quantos arquivos",
        "quantos documentos",
        "listar pdf",
        "listar arquivos",
        "mostrar pdf",
        "mostrar arquivos",
        "how many pdf",
        "how many files",
        "how many documents",
        "list files",
        "list documents",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

// ── Config structs ───────────────────────────────────────────────────

/// Which evidence source fresh retrievals use.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Local collections, in the order their passages are concatenated.
    #[serde(default = "default_collections")]
    pub collections: Vec<CollectionConfig>,

    /// Lexical ranking parameters for local collections.
    #[serde(default)]
    pub bm25: Bm25Params,

    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default = "default_count_keywords")]
    pub count_keywords: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CollectionConfig {
    pub name: String,

    /// Human-readable name used in assembled context and count replies.
    #[serde(default)]
    pub label: String,

    pub path: String,

    /// Passages taken from this collection per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RemoteConfig {
    #[serde(default = "default_solr_url")]
    pub url: String,

    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    #[serde(default = "default_fields")]
    pub fields: Vec<String>,

    #[serde(default = "default_count_ttl_secs")]
    pub count_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_small_model")]
    pub query_model: String,

    #[serde(default = "default_small_model")]
    pub classifier_model: String,

    #[serde(default = "default_answer_model")]
    pub answer_model: String,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            cache_ttl_secs: default_cache_ttl_secs(),
            collections: default_collections(),
            bm25: Bm25Params::default(),
            backend: BackendKind::default(),
            remote: RemoteConfig::default(),
            llm: LlmConfig::default(),
            count_keywords: default_count_keywords(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: default_solr_url(),
            timeout_secs: default_remote_timeout_secs(),
            max_rows: default_max_rows(),
            fields: default_fields(),
            count_ttl_secs: default_count_ttl_secs(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key_env: default_api_key_env(),
            query_model: default_small_model(),
            classifier_model: default_small_model(),
            answer_model: default_answer_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and optionally
    /// generates a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            // Generate template only for the default path
            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let mut cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");

        for collection in &mut cfg.collections {
            if collection.label.is_empty() {
                collection.label = collection.name.clone();
            }
        }

        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(
            self.remote.max_rows > 0 && self.remote.max_rows <= MAX_RECORDS,
            "remote.max_rows must be between 1 and {MAX_RECORDS}"
        );
        anyhow::ensure!(
            self.bm25.k1 >= 0.0 && self.bm25.epsilon >= 0.0,
            "bm25.k1 and bm25.epsilon must not be negative"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.bm25.b),
            "bm25.b must be between 0 and 1"
        );
        anyhow::ensure!(
            !self.remote.fields.is_empty(),
            "remote.fields must not be empty"
        );
        for collection in &self.collections {
            anyhow::ensure!(
                !collection.name.is_empty(),
                "collection name must not be empty"
            );
            anyhow::ensure!(
                collection.top_k > 0,
                "collection {}: top_k must be positive",
                collection.name
            );
        }
        let mut names: Vec<&str> = self.collections.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        anyhow::ensure!(
            names.len() == self.collections.len(),
            "collection names must be unique"
        );
        Ok(())
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    #[must_use]
    pub fn count_ttl(&self) -> Duration {
        Duration::from_secs(self.remote.count_ttl_secs)
    }

    /// Whether `question` asks for the local document counts.
    #[must_use]
    pub fn is_count_question(&self, question: &str) -> bool {
        let lowered = question.to_lowercase();
        self.count_keywords
            .iter()
            .any(|k| lowered.contains(&k.to_lowercase()))
    }
}

// ── Tests ────────────────────────────────────────────────────────────
