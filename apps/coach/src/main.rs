mod chat;
mod cli;
mod config;
mod errors;
mod llm_client;
mod resume;
mod session;
mod workflow;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::InteractiveDriver;
use crate::config::Config;
use crate::llm_client::{Completer, LlmClient};
use crate::resume::ResumeExtractor;
use crate::session::{KvSessionStore, RecordSink, RedisBackend, SessionStore, TabularLog};

#[tokio::main]
async fn main() -> Result<()> {
    // Fails fast when ANTHROPIC_API_KEY is missing
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting AI Interview Coach v{}", env!("CARGO_PKG_VERSION"));

    let llm: Arc<dyn Completer> =
        Arc::new(LlmClient::new(config.anthropic_api_key.clone(), config.llm_timeout)?);
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Connects on first use; lookup and save report an unreachable server then
    let redis = RedisBackend::new(&config.redis_url)?;
    info!("Redis client initialized");

    let store = SessionStore::new(
        RecordSink::new(config.sessions_dir.clone()),
        TabularLog::new(config.session_log_path()),
        KvSessionStore::new(Arc::new(redis)),
    );
    info!("Session sinks under {}", config.sessions_dir.display());

    let driver = InteractiveDriver::new(
        llm,
        Arc::new(ResumeExtractor),
        store,
        config.chat_max_turns,
    );
    driver.run().await
}
