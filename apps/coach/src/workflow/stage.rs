//! Workflow stages and the standalone completions they are built from.
//!
//! Stages only read and extend the `SessionState` they are given. They never
//! prompt the user and never persist anything.

use async_trait::async_trait;
use tracing::info;

use crate::errors::AppError;
use crate::llm_client::{Completer, CompletionError};
use crate::session::{SessionField, SessionState};
use crate::workflow::graph::WorkflowPhase;
use crate::workflow::prompts::{EXTRACT_ROLE_PROMPT, FOLLOW_UP_PROMPT, GENERATE_QUESTIONS_PROMPT};

/// Resume characters sent to the model when extracting a role.
pub const RESUME_PROMPT_CHARS: usize = 2000;

/// A unit of work in the interview workflow.
#[async_trait]
pub trait WorkflowStage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fields that must be set (and non-blank) before `execute`.
    fn requires(&self) -> &'static [SessionField];

    /// Phase the workflow is in once this stage has succeeded.
    fn reaches(&self) -> WorkflowPhase;

    /// First required field the state lacks, if any.
    fn missing_input(&self, state: &SessionState) -> Option<SessionField> {
        self.requires().iter().copied().find(|f| !state.has(*f))
    }

    fn can_run(&self, state: &SessionState) -> bool {
        self.missing_input(state).is_none()
    }

    async fn execute(
        &self,
        state: &mut SessionState,
        completer: &dyn Completer,
    ) -> Result<(), AppError>;
}

/// Caller's answer to "would you like a follow-up question?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUpDecision {
    Ask,
    Skip,
}

impl From<bool> for FollowUpDecision {
    fn from(wanted: bool) -> Self {
        if wanted {
            FollowUpDecision::Ask
        } else {
            FollowUpDecision::Skip
        }
    }
}

fn check_inputs(stage: &dyn WorkflowStage, state: &SessionState) -> Result<(), AppError> {
    match stage.missing_input(state) {
        Some(field) => Err(AppError::MissingInput {
            stage: stage.name(),
            field,
        }),
        None => Ok(()),
    }
}

/// Infers the job title from a resume.
pub struct ExtractRole;

#[async_trait]
impl WorkflowStage for ExtractRole {
    fn name(&self) -> &'static str {
        "extract_role"
    }

    fn requires(&self) -> &'static [SessionField] {
        &[SessionField::ResumeText]
    }

    fn reaches(&self) -> WorkflowPhase {
        WorkflowPhase::RoleExtracted
    }

    async fn execute(
        &self,
        state: &mut SessionState,
        completer: &dyn Completer,
    ) -> Result<(), AppError> {
        check_inputs(self, state)?;
        let resume_text = state.resume_text.as_deref().unwrap_or_default();

        let role = extract_role_from_text(resume_text, completer).await?;
        info!("Extracted role: {role}");
        state.role = Some(role);
        Ok(())
    }
}

/// Produces three technical questions for the role.
pub struct GenerateQuestions;

#[async_trait]
impl WorkflowStage for GenerateQuestions {
    fn name(&self) -> &'static str {
        "generate_questions"
    }

    fn requires(&self) -> &'static [SessionField] {
        &[SessionField::Role]
    }

    fn reaches(&self) -> WorkflowPhase {
        WorkflowPhase::QuestionsGenerated
    }

    async fn execute(
        &self,
        state: &mut SessionState,
        completer: &dyn Completer,
    ) -> Result<(), AppError> {
        check_inputs(self, state)?;
        let role = state.role.as_deref().unwrap_or_default();

        info!("Generating questions for: {role}");
        // Kept verbatim: the block is display text, not parsed.
        let questions = request_questions(role, completer).await?;
        state.questions = Some(questions);
        Ok(())
    }
}

/// Optionally asks for one harder question. The decision is made up front by
/// the caller.
pub struct FollowUp {
    pub decision: FollowUpDecision,
}

#[async_trait]
impl WorkflowStage for FollowUp {
    fn name(&self) -> &'static str {
        "follow_up"
    }

    fn requires(&self) -> &'static [SessionField] {
        &[SessionField::Role, SessionField::Questions]
    }

    fn reaches(&self) -> WorkflowPhase {
        WorkflowPhase::FollowUpResolved
    }

    async fn execute(
        &self,
        state: &mut SessionState,
        completer: &dyn Completer,
    ) -> Result<(), AppError> {
        check_inputs(self, state)?;

        match self.decision {
            FollowUpDecision::Skip => {
                info!("Follow-up declined; interview session complete");
            }
            FollowUpDecision::Ask => {
                let role = state.role.as_deref().unwrap_or_default();
                let prompt = FOLLOW_UP_PROMPT.replace("{role}", role);
                let follow_up = non_blank(completer.complete(&prompt).await?)?;
                info!("Follow-up question generated for: {role}");
                state.follow_up = Some(follow_up);
            }
        }
        Ok(())
    }
}

/// Asks the model for the job title in a resume. Only the first
/// [`RESUME_PROMPT_CHARS`] characters are sent.
pub async fn extract_role_from_text(
    resume_text: &str,
    completer: &dyn Completer,
) -> Result<String, AppError> {
    let excerpt = truncate_chars(resume_text, RESUME_PROMPT_CHARS);
    let prompt = EXTRACT_ROLE_PROMPT.replace("{resume_text}", excerpt);
    let role = non_blank(completer.complete(&prompt).await?)?;
    Ok(role.trim().to_string())
}

/// Standalone question generation for callers outside the graph. Trimmed.
pub async fn generate_interview_questions(
    role: &str,
    completer: &dyn Completer,
) -> Result<String, AppError> {
    info!("Generating interview questions for role: {role}");
    let questions = request_questions(role, completer).await?;
    Ok(questions.trim().to_string())
}

async fn request_questions(role: &str, completer: &dyn Completer) -> Result<String, AppError> {
    let prompt = GENERATE_QUESTIONS_PROMPT.replace("{role}", role);
    non_blank(completer.complete(&prompt).await?)
}

fn non_blank(text: String) -> Result<String, AppError> {
    if text.trim().is_empty() {
        return Err(CompletionError::EmptyContent.into());
    }
    Ok(text)
}

/// The first `max` characters of `text` (not bytes).
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
