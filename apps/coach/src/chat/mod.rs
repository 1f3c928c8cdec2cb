//! Mock-interview chat: a transcript replayed to the completer every turn.
//!
//! The transcript is capped at `max_turns` user/assistant pairs; when a new
//! turn would exceed the cap the oldest pair is dropped. Nothing is persisted.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::errors::AppError;
use crate::llm_client::prompts::CHAT_SYSTEM;
use crate::llm_client::{ChatMessage, Completer};

const EXIT_WORDS: [&str; 2] = ["exit", "quit"];

/// True when the user asked to leave chat mode.
pub fn is_exit(input: &str) -> bool {
    let input = input.trim();
    EXIT_WORDS.iter().any(|w| input.eq_ignore_ascii_case(w))
}

pub struct ChatSession {
    system: String,
    turns: VecDeque<(ChatMessage, ChatMessage)>,
    max_turns: usize,
}

impl ChatSession {
    pub fn new(max_turns: usize) -> Self {
        Self {
            system: CHAT_SYSTEM.to_string(),
            turns: VecDeque::new(),
            max_turns: max_turns.max(1),
        }
    }

    /// Seeds the system prompt with context from an earlier step, such as the
    /// role and questions the user just received.
    pub fn with_context(mut self, context: &str) -> Self {
        self.system = format!("{CHAT_SYSTEM}\n\n{context}");
        self
    }

    /// Full transcript, oldest message first.
    #[cfg(test)]
    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .flat_map(|(user, reply)| [user.clone(), reply.clone()])
            .collect()
    }

    #[cfg(test)]
    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Sends `message` with the whole transcript and records the reply.
    /// A failed call leaves the transcript unchanged.
    pub async fn send(
        &mut self,
        message: &str,
        completer: &dyn Completer,
    ) -> Result<String, AppError> {
        let evict = self.turns.len() >= self.max_turns;

        let user = ChatMessage::user(message);
        let mut transcript: Vec<ChatMessage> = self
            .turns
            .iter()
            .skip(usize::from(evict))
            .flat_map(|(user, reply)| [user.clone(), reply.clone()])
            .collect();
        transcript.push(user.clone());

        let reply = completer
            .converse(&self.system, &transcript)
            .await
            .inspect_err(|e| warn!("Chat turn failed: {e}"))?;

        if evict {
            self.turns.pop_front();
            debug!("Chat transcript at {} turns; dropped the oldest", self.max_turns);
        }
        self.turns.push_back((user, ChatMessage::assistant(reply.clone())));
        Ok(reply)
    }
}
