// Interview workflow: stages, their prompts, and the graph that sequences them.
// All completions go through the `Completer` trait; nothing here persists state.

pub mod graph;
pub mod prompts;
pub mod stage;

#[cfg(test)]
pub(crate) mod testing;

pub use graph::{EntryPoint, WorkflowAbort, WorkflowGraph};
pub use stage::{extract_role_from_text, generate_interview_questions, FollowUpDecision};
