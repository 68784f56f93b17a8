//! Per-turn choice between reusing the previous context and retrieving anew.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assembler::assemble;
use crate::error::RagError;
use crate::llm::{ChatMessage, Generator, Task};
use crate::retriever::{Backend, EvidenceSet, Retriever};

/// What the previous fresh retrieval produced, owned by one conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationState {
    pub last_assembled_context: String,
    pub last_evidence: EvidenceSet,
}

impl ArbitrationState {
    #[must_use]
    pub fn has_context(&self) -> bool {
        !self.last_assembled_context.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    FreshRetrieval,
    ReuseContext,
}

/// Outcome of one arbitrated turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Arbitration {
    pub decision: Decision,
    pub context: String,
    /// Number of evidence items behind `context`.
    pub evidence_count: usize,
}

pub struct Arbitrator {
    generator: Arc<dyn Generator>,
    retriever: Arc<Retriever>,
}

impl Arbitrator {
    pub fn new(generator: Arc<dyn Generator>, retriever: Arc<Retriever>) -> Self {
        Self {
            generator,
            retriever,
        }
    }

    /// Reuse only when the question depends on the previous context and
    /// there is a previous context to reuse.
    pub fn decide(&self, question: &str, state: &ArbitrationState) -> Decision {
        if !state.has_context() {
            return Decision::FreshRetrieval;
        }
        if self.is_contextual(question, &state.last_assembled_context) {
            Decision::ReuseContext
        } else {
            Decision::FreshRetrieval
        }
    }

    /// Classify whether `question` depends on `previous_context`.
    /// A classifier failure counts as "not contextual".
    pub fn is_contextual(&self, question: &str, previous_context: &str) -> bool {
        let messages = [ChatMessage::user(classification_prompt(
            question,
            previous_context,
        ))];
        match self.generator.complete(Task::Classification, &messages) {
            Ok(reply) => normalize_label(&reply) == "contextual",
            Err(e) => {
                warn!("contextuality classification failed, retrieving fresh: {e}");
                false
            }
        }
    }

    /// Produce the context for this turn, retrieving and overwriting `state`
    /// unless the previous context can be reused.
    pub fn arbitrate(
        &self,
        question: &str,
        backend: &Backend,
        state: &mut ArbitrationState,
    ) -> Result<Arbitration, RagError> {
        match self.decide(question, state) {
            Decision::ReuseContext => {
                info!("question is contextual, reusing previous context");
                Ok(Arbitration {
                    decision: Decision::ReuseContext,
                    context: state.last_assembled_context.clone(),
                    evidence_count: state.last_evidence.len(),
                })
            }
            Decision::FreshRetrieval => {
                let evidence = self.retriever.retrieve(question, backend)?;
                let context = assemble(&evidence);
                let evidence_count = evidence.len();

                state.last_assembled_context = context.clone();
                state.last_evidence = evidence;

                Ok(Arbitration {
                    decision: Decision::FreshRetrieval,
                    context,
                    evidence_count,
                })
            }
        }
    }
}

fn classification_prompt(question: &str, previous_context: &str) -> String {
    format!(
        "You are a classifier. Decide whether the question below depends on the previous context.\n\
         PREVIOUS CONTEXT:\n{previous_context}\n\n\
         CURRENT QUESTION:\n{question}\n\n\
         Answer ONLY with:\n\
         - \"contextual\" if the question depends on the previous context.\n\
         - \"nao contextual\" if the question is independent.\n\n\
         Do not explain. One label only."
    )
}

fn normalize_label(reply: &str) -> String {
    reply
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '.'))
        .trim()
        .to_lowercase()
}
