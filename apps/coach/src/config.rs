use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Built once in `main` and handed to each component that needs it.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub redis_url: String,
    pub sessions_dir: PathBuf,
    pub llm_timeout: Duration,
    pub chat_max_turns: usize,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            sessions_dir: std::env::var("SESSIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("sessions")),
            llm_timeout: Duration::from_secs(
                std::env::var("LLM_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse::<u64>()
                    .context("LLM_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            chat_max_turns: std::env::var("CHAT_MAX_TURNS")
                .unwrap_or_else(|_| "20".to_string())
                .parse::<usize>()
                .context("CHAT_MAX_TURNS must be a positive integer")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Path of the shared tabular session log inside the sessions directory.
    pub fn session_log_path(&self) -> PathBuf {
        self.sessions_dir.join("interview_sessions.csv")
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
