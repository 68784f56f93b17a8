//! Language-model completion interface.
//!
//! One trait serves the three capabilities the pipeline needs: query
//! synthesis, contextuality classification and answer generation.
pub mod mock;
pub mod openai;

use serde::{Deserialize, Serialize};

use crate::error::RagError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// What a completion is for; implementations may pick a model per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    QuerySynthesis,
    Classification,
    Answer,
}

/// Trait for chat-completion backends.
///
/// Calls are blocking and are never retried by the pipeline. All
/// implementations must be `Send + Sync` to allow sharing behind `Arc`.
pub trait Generator: Send + Sync {
    /// Complete an ordered list of messages, returning the reply text.
    fn complete(&self, task: Task, messages: &[ChatMessage]) -> Result<String, RagError>;
}
