use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Named fields of a [`SessionState`], used by stage preconditions and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionField {
    ResumeText,
    Role,
    Questions,
    FollowUp,
}

impl SessionField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionField::ResumeText => "resume_text",
            SessionField::Role => "role",
            SessionField::Questions => "questions",
            SessionField::FollowUp => "follow_up",
        }
    }
}

impl fmt::Display for SessionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the workflow that produced a state ran to its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Complete,
    Incomplete,
}

/// The record threaded through the interview workflow.
///
/// Fields only ever go from `None` to `Some` while the graph runs.
/// `timestamp` and `session_id` are stamped by the session store at save time.
/// Unset fields are omitted from the serialized document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Local>>,
    /// Set by the workflow graph when a run ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
}

impl SessionState {
    /// State for a resume-driven run.
    pub fn from_resume(resume_text: impl Into<String>) -> Self {
        SessionState {
            resume_text: Some(resume_text.into()),
            ..Default::default()
        }
    }

    /// State for a run where the caller already knows the role.
    pub fn from_role(role: impl Into<String>) -> Self {
        SessionState {
            role: Some(role.into()),
            ..Default::default()
        }
    }

    pub fn get(&self, field: SessionField) -> Option<&str> {
        match field {
            SessionField::ResumeText => self.resume_text.as_deref(),
            SessionField::Role => self.role.as_deref(),
            SessionField::Questions => self.questions.as_deref(),
            SessionField::FollowUp => self.follow_up.as_deref(),
        }
    }

    /// A state without a recorded status counts as complete once it has
    /// both a role and questions.
    pub fn is_complete(&self) -> bool {
        match self.status {
            Some(status) => status == SessionStatus::Complete,
            None => self.has(SessionField::Role) && self.has(SessionField::Questions),
        }
    }

    /// True when the field is set to something other than whitespace.
    pub fn has(&self, field: SessionField) -> bool {
        self.get(field).is_some_and(|v| !v.trim().is_empty())
    }
}
