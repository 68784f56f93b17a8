//! Chat-completions client for OpenAI-compatible endpoints.
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatMessage, Generator, Task};
use crate::config::LlmConfig;
use crate::error::RagError;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiClient {
    client: reqwest::blocking::Client,
    config: LlmConfig,
    api_key: Option<String>,
}

impl OpenAiClient {
    /// Build a client; the API key is read from `config.api_key_env`.
    ///
    /// A missing key is not an error here: every call then fails with
    /// `Generation` and the pipeline degrades.
    pub fn new(config: &LlmConfig) -> Result<Self, RagError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("scholarag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RagError::Generation(format!("HTTP client build failed: {e}")))?;

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!("{} is not set; generation calls will fail", config.api_key_env);
        }

        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    fn model_for(&self, task: Task) -> &str {
        match task {
            Task::QuerySynthesis => &self.config.query_model,
            Task::Classification => &self.config.classifier_model,
            Task::Answer => &self.config.answer_model,
        }
    }
}

impl Generator for OpenAiClient {
    fn complete(&self, task: Task, messages: &[ChatMessage]) -> Result<String, RagError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            RagError::Generation(format!("{} is not set", self.config.api_key_env))
        })?;
        let model = self.model_for(task);
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        debug!(?task, model, messages = messages.len(), "chat completion");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&CompletionRequest { model, messages })
            .send()
            .map_err(|e| RagError::Generation(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(RagError::Generation(format!(
                "completion endpoint returned status {}",
                resp.status()
            )));
        }

        let body: CompletionResponse = resp
            .json()
            .map_err(|e| RagError::Generation(format!("invalid completion response: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| RagError::Generation("completion had no content".to_string()))
    }
}
