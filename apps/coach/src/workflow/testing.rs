//! Test doubles for the `Completer` seam.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm_client::{Completer, CompletionError};

const ROLE_MARKER: &str = "Extract the job title";
const QUESTIONS_MARKER: &str = "technical interview questions";
const FOLLOW_UP_MARKER: &str = "follow-up interview question";

/// Answers each stage prompt with a canned reply and records every prompt it sees.
pub(crate) struct ScriptedCompleter {
    role: String,
    questions: String,
    follow_up: String,
    chat_reply: String,
    fail_on: Option<&'static str>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompleter {
    pub(crate) fn new() -> Self {
        Self {
            role: "QA Automation Engineer".to_string(),
            questions: "1) ... 2) ... 3) ...".to_string(),
            follow_up: "How would you stabilise a flaky end-to-end suite?".to_string(),
            chat_reply: "Good answer. Next question?".to_string(),
            fail_on: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    pub(crate) fn with_questions(mut self, questions: &str) -> Self {
        self.questions = questions.to_string();
        self
    }

    /// Fails any prompt containing `marker` with an auth error.
    pub(crate) fn failing_on(mut self, marker: &'static str) -> Self {
        self.fail_on = Some(marker);
        self
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Completer for ScriptedCompleter {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if self.fail_on.is_some_and(|m| prompt.contains(m)) {
            return Err(CompletionError::Api {
                status: 401,
                message: "invalid x-api-key".to_string(),
            });
        }

        let reply = if prompt.contains(ROLE_MARKER) {
            &self.role
        } else if prompt.contains(QUESTIONS_MARKER) {
            &self.questions
        } else if prompt.contains(FOLLOW_UP_MARKER) {
            &self.follow_up
        } else {
            &self.chat_reply
        };
        Ok(reply.clone())
    }
}
