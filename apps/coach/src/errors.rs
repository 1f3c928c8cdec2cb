use thiserror::Error;

use crate::llm_client::CompletionError;
use crate::session::SessionField;

/// Application-level error type shared by stages, sinks and the extractor.
#[derive(Debug, Error)]
pub enum AppError {
    /// A stage was executed directly without one of its inputs.
    #[error("Missing input for {stage}: '{field}' is not set")]
    MissingInput {
        stage: &'static str,
        field: SessionField,
    },

    /// The workflow graph refused to start a stage.
    #[error("Precondition failed before {stage}: '{field}' is not set")]
    Precondition {
        stage: &'static str,
        field: SessionField,
    },

    #[error("Stage '{stage}' failed: {cause}")]
    Stage {
        stage: &'static str,
        #[source]
        cause: Box<AppError>,
    },

    #[error("Completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Empty content: {0}")]
    EmptyContent(String),

    #[error("Persistence error ({sink}): {message}")]
    Persistence { sink: &'static str, message: String },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn persistence(sink: &'static str, err: impl std::fmt::Display) -> Self {
        AppError::Persistence {
            sink,
            message: err.to_string(),
        }
    }

    /// Innermost error, skipping any `Stage` wrappers.
    pub fn root_cause(&self) -> &AppError {
        match self {
            AppError::Stage { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Message printed by the interactive driver. Names the failed stage or
    /// sink followed by the underlying cause.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Stage { stage, cause } => {
                format!("The '{stage}' step failed: {}", cause.root_cause())
            }
            AppError::Precondition { stage, field } => {
                format!("Cannot run '{stage}': {field} is missing")
            }
            AppError::Persistence { sink, message } => {
                format!("Saving to {sink} failed: {message}")
            }
            AppError::Completion(e) => format!("The language model call failed: {e}"),
            other => other.to_string(),
        }
    }
}
