/// Scripted generator for tests.
///
/// Replies are queued per task and consumed in order; every call is recorded
/// so tests can assert which capabilities were (or were not) invoked.
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::{ChatMessage, Generator, Task};
use crate::error::RagError;

#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<HashMap<Task, VecDeque<Result<String, String>>>>,
    calls: Mutex<Vec<(Task, Vec<ChatMessage>)>>,
}

impl ScriptedGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply for `task`.
    #[must_use]
    pub fn with_reply(self, task: Task, reply: &str) -> Self {
        self.push(task, Ok(reply.to_string()));
        self
    }

    /// Queue a failure for `task`.
    #[must_use]
    pub fn with_failure(self, task: Task, message: &str) -> Self {
        self.push(task, Err(message.to_string()));
        self
    }

    pub fn push(&self, task: Task, reply: Result<String, String>) {
        self.replies
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(task)
            .or_default()
            .push_back(reply);
    }

    /// Number of calls made for `task`.
    pub fn calls(&self, task: Task) -> usize {
        self.recorded().iter().filter(|(t, _)| *t == task).count()
    }

    /// Messages of the most recent call for `task`.
    pub fn last_messages(&self, task: Task) -> Option<Vec<ChatMessage>> {
        self.recorded()
            .into_iter()
            .rev()
            .find(|(t, _)| *t == task)
            .map(|(_, messages)| messages)
    }

    fn recorded(&self) -> Vec<(Task, Vec<ChatMessage>)> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl Generator for ScriptedGenerator {
    fn complete(&self, task: Task, messages: &[ChatMessage]) -> Result<String, RagError> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((task, messages.to_vec()));

        let next = self
            .replies
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get_mut(&task)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(RagError::Generation(message)),
            None => Err(RagError::Generation(format!("no scripted reply for {task:?}"))),
        }
    }
}
