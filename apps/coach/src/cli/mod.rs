//! Interactive menu driver. The only layer that catches errors without
//! re-raising: a failed mode is reported and the process exits normally.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use dialoguer::{Confirm, Input, Select};
use tracing::{error, info};

use crate::chat::{is_exit, ChatSession};
use crate::errors::AppError;
use crate::llm_client::Completer;
use crate::resume::TextExtractor;
use crate::session::{SaveReport, SessionField, SessionState, SessionStore};
use crate::workflow::{
    extract_role_from_text, generate_interview_questions, EntryPoint, FollowUpDecision,
    WorkflowAbort, WorkflowGraph,
};

const MODES: [&str; 4] = [
    "Generate questions manually (enter role)",
    "Upload resume + chat mode",
    "Upload resume + interview workflow",
    "Look up a saved session",
];

pub struct InteractiveDriver {
    completer: Arc<dyn Completer>,
    extractor: Arc<dyn TextExtractor>,
    store: SessionStore,
    chat_max_turns: usize,
}

impl InteractiveDriver {
    pub fn new(
        completer: Arc<dyn Completer>,
        extractor: Arc<dyn TextExtractor>,
        store: SessionStore,
        chat_max_turns: usize,
    ) -> Self {
        Self {
            completer,
            extractor,
            store,
            chat_max_turns,
        }
    }

    pub async fn run(&self) -> Result<()> {
        println!("AI Interview Coach - choose your mode\n");
        let choice = Select::new()
            .with_prompt("Select an option")
            .items(&MODES)
            .default(0)
            .interact()?;

        let result = match choice {
            0 => self.questions_mode().await,
            1 => self.resume_chat_mode().await,
            2 => self.workflow_mode().await,
            _ => self.lookup_mode().await,
        };

        if let Err(e) = result {
            error!("{} failed: {e:#}", MODES[choice]);
            match e.downcast_ref::<AppError>() {
                Some(app) => println!("\nError: {}", app.user_message()),
                None => println!("\nError: {e}"),
            }
        }
        Ok(())
    }

    async fn questions_mode(&self) -> Result<()> {
        let source = Select::new()
            .with_prompt("Type a role or upload a resume?")
            .items(&["Type a role", "Upload a resume (PDF or text)"])
            .default(0)
            .interact()?;

        if source == 0 {
            let role = Input::<String>::new()
                .with_prompt("Job role (e.g. QA Automation Engineer)")
                .allow_empty(true)
                .interact_text()?;
            let state = SessionState::from_role(role.trim());
            let graph = WorkflowGraph::interview(self.completer.clone(), FollowUpDecision::Skip)
                .with_entry(EntryPoint::for_state(&state));
            if !graph.can_run("generate_questions", &state) {
                println!("Role cannot be empty.");
                return Ok(());
            }

            println!("Generating interview questions...\n");
            let outcome = graph.invoke(state).await.map_err(|abort| abort.error)?;
            let questions = outcome.state.questions.unwrap_or_default();
            println!("Here are your questions:\n\n{}", questions.trim());
            return Ok(());
        }

        let resume_text = self.read_resume()?;
        println!("Extracting role from resume...");
        let role = extract_role_from_text(&resume_text, self.completer.as_ref()).await?;
        println!("\nDetected role: {role}\n");

        println!("Generating interview questions...\n");
        let questions = generate_interview_questions(&role, self.completer.as_ref()).await?;
        println!("Here are your questions:\n\n{questions}");
        Ok(())
    }

    async fn resume_chat_mode(&self) -> Result<()> {
        let resume_text = self.read_resume()?;

        println!("Extracting role from resume...");
        let role = extract_role_from_text(&resume_text, self.completer.as_ref()).await?;
        println!("\nDetected role: {role}\n");

        println!("Generating interview questions...\n");
        let questions = generate_interview_questions(&role, self.completer.as_ref()).await?;
        println!("Here are your questions:\n\n{questions}\n");

        let start_chat = Confirm::new()
            .with_prompt("Start a mock interview chat?")
            .default(true)
            .interact()?;
        if !start_chat {
            println!("Thank you for using AI Interview Coach!");
            return Ok(());
        }

        let context = format!(
            "The candidate is preparing for the role: {role}.\nQuestions so far:\n{questions}"
        );
        let mut chat = ChatSession::new(self.chat_max_turns).with_context(&context);
        println!("\nInterview chat mode (type 'exit' to quit)\n");
        loop {
            let message: String = Input::new().with_prompt("You").interact_text()?;
            if is_exit(&message) {
                println!("Exiting chat mode.");
                return Ok(());
            }
            let reply = chat.send(&message, self.completer.as_ref()).await?;
            println!("Coach: {reply}\n");
        }
    }

    async fn workflow_mode(&self) -> Result<()> {
        let resume_text = self.read_resume()?;

        let follow_up: FollowUpDecision = Confirm::new()
            .with_prompt("Would you like a follow-up question at the end?")
            .default(false)
            .interact()?
            .into();

        println!("Starting interview workflow...");
        let graph = WorkflowGraph::interview(self.completer.clone(), follow_up);
        let state = SessionState::from_resume(resume_text);

        match graph.invoke(state).await {
            Ok(outcome) => {
                print_session(&outcome.state);
                info!(
                    "Workflow finished in phase {} after {:?}",
                    outcome.phase, outcome.completed
                );
                let report = self.store.save(outcome.state).await;
                print_report(&report, "Session");
                Ok(())
            }
            Err(abort) => {
                println!(
                    "\nThe workflow {} after '{}' (completed steps: {}).",
                    abort.phase(),
                    abort.reached,
                    abort.completed.join(", ")
                );
                let save_partial = Confirm::new()
                    .with_prompt("Save the incomplete session for later review?")
                    .default(false)
                    .interact()?;
                let WorkflowAbort { state, error, .. } = *abort;
                if save_partial {
                    let report = self.store.save(state).await;
                    print_report(&report, "Incomplete session");
                }
                Err(error.into())
            }
        }
    }

    async fn lookup_mode(&self) -> Result<()> {
        let mut ids = self.store.kv().list_sessions().await?;
        if ids.is_empty() {
            println!("No saved sessions.");
            return Ok(());
        }
        ids.reverse();

        let pick = Select::new()
            .with_prompt("Saved sessions (newest first)")
            .items(&ids)
            .default(0)
            .interact()?;
        let state = self.store.kv().load_session(&ids[pick]).await?;
        if !state.is_complete() {
            println!("\nThis session is incomplete: the workflow stopped before the end.");
        }
        println!("{}", serde_json::to_string_pretty(&state)?);
        Ok(())
    }

    fn read_resume(&self) -> Result<String> {
        let path: String = Input::new()
            .with_prompt("Path to resume (e.g. data/sample_resume.pdf)")
            .interact_text()?;
        println!("\nExtracting text from resume...");
        Ok(self.extractor.extract(&PathBuf::from(path.trim()))?)
    }
}

const SHOWN_FIELDS: [(SessionField, &str); 3] = [
    (SessionField::Role, "Role"),
    (SessionField::Questions, "Generated questions"),
    (SessionField::FollowUp, "Follow-up question"),
];

fn print_session(state: &SessionState) {
    for (field, label) in SHOWN_FIELDS {
        if let Some(value) = state.get(field) {
            println!("\n{label}:\n{value}");
        }
    }
}

fn print_report(report: &SaveReport, label: &str) {
    if let Ok(path) = &report.record {
        println!("\n{label} saved to: {}", path.display());
    }
    if report.log.is_ok() {
        println!("Session log updated.");
    }
    if let Ok(id) = &report.kv {
        println!("{label} stored with ID: {id}");
    }
    for failure in report.failures() {
        println!("Warning: {}", failure.user_message());
    }
}
