//! One conversation: turn log, arbitration state and the per-turn pipeline.
//!
//! Each question runs sequentially: count shortcut, then arbitration, then
//! answer generation. Only `Precondition` errors escape `ask`.
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::arbitrator::{ArbitrationState, Arbitrator, Decision};
use crate::config::Config;
use crate::error::RagError;
use crate::llm::{ChatMessage, Generator, Role, Task};
use crate::retriever::{Backend, Retriever};

/// Direct answer when the remote index returned nothing.
pub const NO_REMOTE_RESULTS_ANSWER: &str =
    "No relevant document was found in the remote catalogue for the requested topic.";

/// Direct answer when no local passage matched.
pub const NO_LOCAL_RESULTS_ANSWER: &str =
    "No relevant content was found in the local documents for the requested topic.";

const ANSWER_INSTRUCTION: &str = "You are an academic assistant specialised in theses and dissertations. \
Use the conversation history and the supplied documents to answer. \
If there are no relevant documents, use the information from the earlier history. \
If there is still not enough basis, say clearly that no information is available in the database. \
Be direct, academic and objective, and finish by stating the total number of documents used and their links.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

/// How a reply was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    DocumentCount,
    NoEvidence,
    Generated,
    GenerationFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub kind: AnswerKind,
    /// `None` for the count shortcut, which bypasses arbitration.
    pub decision: Option<Decision>,
    pub context: Option<String>,
}

/// Components shared by every conversation of a process.
pub struct Engine {
    generator: Arc<dyn Generator>,
    retriever: Arc<Retriever>,
    arbitrator: Arbitrator,
    backend: Backend,
    config: Config,
}

impl Engine {
    pub fn new(
        config: &Config,
        generator: Arc<dyn Generator>,
        retriever: Arc<Retriever>,
        backend: Backend,
    ) -> Self {
        Self {
            arbitrator: Arbitrator::new(generator.clone(), retriever.clone()),
            generator,
            retriever,
            backend,
            config: config.clone(),
        }
    }

    /// Forget cached collection builds and counts.
    pub fn reload(&self) {
        self.retriever.reload();
    }

    fn document_count_reply(&self) -> String {
        let counts = self.retriever.local_document_counts();
        let total: usize = counts.iter().map(|c| c.documents).sum();

        let mut lines = vec![format!("There are currently {total} local documents available:")];
        lines.extend(
            counts
                .iter()
                .map(|c| format!("- {}: {} documents", c.label, c.documents)),
        );

        if self.backend == Backend::Remote {
            match self.retriever.remote_document_count() {
                Some(n) => lines.push(format!("Remote catalogue: {n} records")),
                None => lines.push("Remote catalogue: unavailable".to_string()),
            }
        }
        lines.join("\n")
    }

    fn no_evidence_answer(&self) -> &'static str {
        match self.backend {
            Backend::Remote => NO_REMOTE_RESULTS_ANSWER,
            Backend::Local(_) => NO_LOCAL_RESULTS_ANSWER,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SessionFile {
    turns: Vec<ConversationTurn>,
    state: ArbitrationState,
}

pub struct Conversation {
    engine: Arc<Engine>,
    turns: Vec<ConversationTurn>,
    state: ArbitrationState,
}

impl Conversation {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            turns: Vec::new(),
            state: ArbitrationState::default(),
        }
    }

    /// Resume a conversation saved with [`Conversation::save`].
    /// A missing file starts an empty conversation.
    pub fn load(engine: Arc<Engine>, path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no session at {}, starting a new conversation", path.display());
            return Ok(Self::new(engine));
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session {}", path.display()))?;
        let session: SessionFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session {}", path.display()))?;
        info!("resumed session with {} turns", session.turns.len());

        Ok(Self {
            engine,
            turns: session.turns,
            state: session.state,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let session = SessionFile {
            turns: self.turns.clone(),
            state: self.state.clone(),
        };
        let content = serde_json::to_string_pretty(&session)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write session {}", path.display()))?;
        Ok(())
    }

    #[must_use]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    #[must_use]
    pub fn state(&self) -> &ArbitrationState {
        &self.state
    }

    /// Answer one question and append both sides to the turn log.
    pub fn ask(&mut self, question: &str) -> Result<Reply, RagError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::Precondition("question is empty".to_string()));
        }
        let engine = Arc::clone(&self.engine);

        if engine.config.is_count_question(question) {
            info!("count question, answering from collection counts");
            let text = engine.document_count_reply();
            self.push(Role::User, question);
            self.push(Role::Assistant, &text);
            return Ok(Reply {
                text,
                kind: AnswerKind::DocumentCount,
                decision: None,
                context: None,
            });
        }

        let arbitration = engine
            .arbitrator
            .arbitrate(question, &engine.backend, &mut self.state)?;
        self.push(Role::User, question);

        let (text, kind) = if arbitration.decision == Decision::FreshRetrieval
            && arbitration.evidence_count == 0
        {
            (engine.no_evidence_answer().to_string(), AnswerKind::NoEvidence)
        } else {
            let messages = answer_messages(&self.turns, &arbitration.context);
            match engine.generator.complete(Task::Answer, &messages) {
                Ok(answer) => (answer, AnswerKind::Generated),
                Err(e) => {
                    warn!("answer generation failed: {e}");
                    (
                        format!("An error occurred while generating the answer: {e}"),
                        AnswerKind::GenerationFailed,
                    )
                }
            }
        };

        self.push(Role::Assistant, &text);
        Ok(Reply {
            text,
            kind,
            decision: Some(arbitration.decision),
            context: Some(arbitration.context),
        })
    }

    fn push(&mut self, role: Role, text: &str) {
        self.turns.push(ConversationTurn {
            role,
            text: text.to_string(),
        });
    }
}

/// Instruction, full history (ending with the current question), then the
/// context as a trailing system message.
fn answer_messages(turns: &[ConversationTurn], context: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(turns.len() + 2);
    messages.push(ChatMessage::system(ANSWER_INSTRUCTION));
    messages.extend(turns.iter().map(|t| ChatMessage {
        role: t.role,
        content: t.text.clone(),
    }));
    messages.push(ChatMessage::system(format!(
        "Use the following background information to formulate your answer \
         (do not mention this block, only use the data):\n{context}"
    )));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CollectionCache;
    use crate::config::{BackendKind, CollectionConfig};
    use crate::indexer::extract::DocumentExtractor;
    use crate::llm::mock::ScriptedGenerator;
    use crate::remote::mock::{StaticIndex, record};
    use tempfile::TempDir;

    fn engine(
        config: &Config,
        generator: Arc<ScriptedGenerator>,
        remote: Arc<StaticIndex>,
        kind: BackendKind,
    ) -> Arc<Engine> {
        let cache = Arc::new(CollectionCache::new(
            &config.collections,
            config.chunk_size,
            Arc::new(DocumentExtractor),
        ));
        let retriever = Arc::new(Retriever::new(config, generator.clone(), remote, cache));
        Arc::new(Engine::new(
            config,
            generator,
            retriever,
            Backend::from_config(config, kind),
        ))
    }

    fn local_config(dir: &TempDir) -> Config {
        Config {
            collections: vec![CollectionConfig {
                name: "notas".to_string(),
                label: "Notes".to_string(),
                path: dir.path().to_string_lossy().to_string(),
                top_k: 3,
                extensions: vec!["txt".to_string()],
            }],
            ..Config::default()
        }
    }

    #[test]
    fn test_empty_question_is_precondition() {
        let config = Config::default();
        let generator = Arc::new(ScriptedGenerator::new());
        let engine = engine(
            &config,
            generator,
            Arc::new(StaticIndex::new(Vec::new())),
            BackendKind::Remote,
        );
        let mut conversation = Conversation::new(engine);
        assert!(matches!(
            conversation.ask("   "),
            Err(RagError::Precondition(_))
        ));
        assert!(conversation.turns().is_empty());
    }

    #[test]
    fn test_count_shortcut_with_remote_total() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "um").unwrap();
        fs::write(dir.path().join("b.txt"), "dois").unwrap();
        let config = local_config(&dir);
        let generator = Arc::new(ScriptedGenerator::new());
        let remote = Arc::new(StaticIndex::new(Vec::new()).with_total_hits(1234));
        let engine = engine(&config, generator.clone(), remote, BackendKind::Remote);
        let mut conversation = Conversation::new(engine);

        let reply = conversation.ask("Quantos arquivos existem?").unwrap();
        assert_eq!(reply.kind, AnswerKind::DocumentCount);
        assert!(reply.text.contains("- Notes: 2 documents"));
        assert!(reply.text.contains("Remote catalogue: 1234 records"));
        assert_eq!(generator.calls(Task::Classification), 0);
        assert_eq!(generator.calls(Task::QuerySynthesis), 0);
        assert_eq!(conversation.turns().len(), 2);
        assert_eq!(conversation.state(), &ArbitrationState::default());
    }

    #[test]
    fn test_local_answer_sees_history_and_context() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "emulação de software antigo").unwrap();
        let config = local_config(&dir);
        let generator =
            Arc::new(ScriptedGenerator::new().with_reply(Task::Answer, "Resposta."));
        let engine = engine(
            &config,
            generator.clone(),
            Arc::new(StaticIndex::new(Vec::new())),
            BackendKind::Local,
        );
        let mut conversation = Conversation::new(engine);

        let reply = conversation.ask("emulação").unwrap();
        assert_eq!(reply.kind, AnswerKind::Generated);
        assert_eq!(reply.text, "Resposta.");
        assert_eq!(reply.decision, Some(Decision::FreshRetrieval));

        let messages = generator.last_messages(Task::Answer).unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1], ChatMessage::user("emulação"));
        assert_eq!(messages[2].role, Role::System);
        assert!(messages[2].content.contains("File: a.txt"));
        assert_eq!(conversation.turns()[1].text, "Resposta.");
    }

    #[test]
    fn test_generation_failure_apologises() {
        let config = Config::default();
        let generator =
            Arc::new(ScriptedGenerator::new().with_failure(Task::Answer, "quota exceeded"));
        let remote = Arc::new(StaticIndex::new(vec![record("Acervos")]));
        let engine = engine(&config, generator, remote, BackendKind::Remote);
        let mut conversation = Conversation::new(engine);

        let reply = conversation.ask("acervos digitais").unwrap();
        assert_eq!(reply.kind, AnswerKind::GenerationFailed);
        assert!(reply.text.contains("quota exceeded"));
        assert_eq!(conversation.turns().len(), 2);
    }

    #[test]
    fn test_remote_no_evidence_is_direct_answer() {
        let config = Config::default();
        let generator = Arc::new(ScriptedGenerator::new());
        let engine = engine(
            &config,
            generator.clone(),
            Arc::new(StaticIndex::new(Vec::new())),
            BackendKind::Remote,
        );
        let mut conversation = Conversation::new(engine);

        let reply = conversation.ask("tema inexistente").unwrap();
        assert_eq!(reply.kind, AnswerKind::NoEvidence);
        assert_eq!(reply.text, NO_REMOTE_RESULTS_ANSWER);
        assert_eq!(generator.calls(Task::Answer), 0);
    }

    #[test]
    fn test_session_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let config = Config::default();
        let generator = Arc::new(ScriptedGenerator::new().with_reply(Task::Answer, "Ok."));
        let remote = Arc::new(StaticIndex::new(vec![record("Acervos")]));
        let engine = engine(&config, generator, remote, BackendKind::Remote);

        let mut conversation = Conversation::new(engine.clone());
        conversation.ask("acervos").unwrap();
        conversation.save(&path).unwrap();

        let resumed = Conversation::load(engine, &path).unwrap();
        assert_eq!(resumed.turns(), conversation.turns());
        assert_eq!(resumed.state(), conversation.state());
    }

    #[test]
    fn test_load_missing_session_starts_empty() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let engine = engine(
            &config,
            Arc::new(ScriptedGenerator::new()),
            Arc::new(StaticIndex::new(Vec::new())),
            BackendKind::Remote,
        );
        let conversation = Conversation::load(engine, &dir.path().join("none.json")).unwrap();
        assert!(conversation.turns().is_empty());
    }
}
