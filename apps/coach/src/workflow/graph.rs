//! Interview workflow graph.
//!
//! Flow: extract_role → generate_questions → follow_up → end.
//!
//! The graph is a linear state machine over [`WorkflowPhase`]. Each stage
//! boundary is a transition; any failure moves the run to `Aborted`, which is
//! terminal. `FollowUpResolved` is the only successful end state.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::errors::AppError;
use crate::llm_client::Completer;
use crate::session::{SessionState, SessionStatus};
use crate::workflow::stage::{
    ExtractRole, FollowUp, FollowUpDecision, GenerateQuestions, WorkflowStage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    Start,
    RoleExtracted,
    QuestionsGenerated,
    FollowUpResolved,
    Aborted,
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowPhase::Start => "start",
            WorkflowPhase::RoleExtracted => "role_extracted",
            WorkflowPhase::QuestionsGenerated => "questions_generated",
            WorkflowPhase::FollowUpResolved => "follow_up_resolved",
            WorkflowPhase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Where a run enters the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    ExtractRole,
    /// For callers that seed `role` themselves.
    GenerateQuestions,
}

impl EntryPoint {
    /// Skips role extraction when the state already carries a role.
    pub fn for_state(state: &SessionState) -> Self {
        if state.has(crate::session::SessionField::Role) {
            EntryPoint::GenerateQuestions
        } else {
            EntryPoint::ExtractRole
        }
    }

    fn stage_name(&self) -> &'static str {
        match self {
            EntryPoint::ExtractRole => "extract_role",
            EntryPoint::GenerateQuestions => "generate_questions",
        }
    }
}

/// Result of a run that reached `FollowUpResolved`.
#[derive(Debug)]
pub struct WorkflowOutcome {
    pub state: SessionState,
    pub phase: WorkflowPhase,
    /// Names of the stages that ran, in order.
    pub completed: Vec<&'static str>,
}

/// A run that ended in `Aborted`. Carries the state as it was when the
/// failing stage stopped, so the caller can inspect or save it.
#[derive(Debug, Error)]
#[error("workflow aborted after {reached}: {error}")]
pub struct WorkflowAbort {
    /// Last phase reached before the failure.
    pub reached: WorkflowPhase,
    pub completed: Vec<&'static str>,
    pub state: SessionState,
    #[source]
    pub error: AppError,
}

impl WorkflowAbort {
    pub fn phase(&self) -> WorkflowPhase {
        WorkflowPhase::Aborted
    }
}

pub struct WorkflowGraph {
    stages: Vec<Box<dyn WorkflowStage>>,
    entry: usize,
    completer: Arc<dyn Completer>,
}

impl WorkflowGraph {
    /// The standard interview pipeline, entered at `extract_role`.
    pub fn interview(completer: Arc<dyn Completer>, follow_up: FollowUpDecision) -> Self {
        Self {
            stages: vec![
                Box::new(ExtractRole),
                Box::new(GenerateQuestions),
                Box::new(FollowUp {
                    decision: follow_up,
                }),
            ],
            entry: 0,
            completer,
        }
    }

    pub fn with_entry(mut self, entry: EntryPoint) -> Self {
        self.entry = self
            .stages
            .iter()
            .position(|s| s.name() == entry.stage_name())
            .unwrap_or(0);
        self
    }

    /// Stages this graph will run, in order, starting at the entry point.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages[self.entry..].iter().map(|s| s.name()).collect()
    }

    /// Whether the named stage's inputs are present in `state`.
    pub fn can_run(&self, stage: &str, state: &SessionState) -> bool {
        self.stages
            .iter()
            .find(|s| s.name() == stage)
            .is_some_and(|s| s.can_run(state))
    }

    /// Runs every stage from the entry point in order.
    ///
    /// Before each stage its inputs are checked; a missing one aborts with
    /// `AppError::Precondition`. A failing stage aborts with `AppError::Stage`.
    /// Stages already run are not undone.
    pub async fn invoke(
        &self,
        initial: SessionState,
    ) -> Result<WorkflowOutcome, Box<WorkflowAbort>> {
        let mut state = initial;
        // Entering past the first stage means the earlier phases were seeded.
        let mut phase = self
            .entry
            .checked_sub(1)
            .map_or(WorkflowPhase::Start, |i| self.stages[i].reaches());
        let mut completed = Vec::with_capacity(self.stages.len());

        info!("Starting interview workflow: {}", self.stage_names().join(" -> "));

        for stage in &self.stages[self.entry..] {
            let name = stage.name();

            let failure = match stage.missing_input(&state) {
                Some(field) => Some(AppError::Precondition { stage: name, field }),
                None => {
                    info!(stage = name, "Running stage");
                    stage
                        .execute(&mut state, self.completer.as_ref())
                        .await
                        .err()
                        .map(|cause| AppError::Stage {
                            stage: name,
                            cause: Box::new(cause),
                        })
                }
            };

            if let Some(error) = failure {
                error!(stage = name, reached = %phase, "Workflow aborted: {error}");
                state.status = Some(SessionStatus::Incomplete);
                return Err(Box::new(WorkflowAbort {
                    reached: phase,
                    completed,
                    state,
                    error,
                }));
            }

            phase = stage.reaches();
            completed.push(name);
            info!(stage = name, phase = %phase, "Stage finished");
        }

        state.status = Some(SessionStatus::Complete);
        Ok(WorkflowOutcome {
            state,
            phase,
            completed,
        })
    }
}
