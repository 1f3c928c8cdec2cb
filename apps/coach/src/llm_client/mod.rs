/// LLM Client: the single point of entry for all Claude API calls in the coach.
///
/// ARCHITECTURAL RULE: stages, chat and the driver only see the `Completer`
/// trait. Nothing outside this module talks to the Anthropic API.
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all completions.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 1024;
const MAX_RETRIES: u32 = 3;
/// First retry delay; doubles on every further attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Speaker of a transcript message. The system prompt travels separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single message in a conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Text-completion capability consumed by the workflow stages and chat mode.
///
/// Swappable so tests can script or spy on prompts without a network.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Turns a single prompt into completion text.
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    /// Replays a whole transcript and returns the next assistant reply.
    ///
    /// The default flattens the transcript into one prompt; backends with a
    /// native multi-message API override it.
    async fn converse(
        &self,
        system: &str,
        transcript: &[ChatMessage],
    ) -> Result<String, CompletionError> {
        let prompt = render_transcript(system, transcript);
        self.complete(&prompt).await
    }
}

/// Renders a transcript as plain text, ending with an open assistant turn.
pub fn render_transcript(system: &str, transcript: &[ChatMessage]) -> String {
    let mut out = format!("{system}\n\n");
    for message in transcript {
        let speaker = match message.role {
            MessageRole::User => "Human",
            MessageRole::Assistant => "Assistant",
        };
        out.push_str(&format!("{speaker}: {}\n", message.content));
    }
    out.push_str("Assistant:");
    out
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// The Anthropic-backed `Completer`, created once per process.
/// Wraps the Messages API with retry logic and an overall deadline per call.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
    timeout: Duration,
    retry_base_delay: Duration,
}

impl LlmClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, CompletionError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            api_url: ANTHROPIC_API_URL.to_string(),
            timeout,
            retry_base_delay: RETRY_BASE_DELAY,
        })
    }

    /// Client for a local stand-in of the Messages API.
    #[cfg(test)]
    fn with_endpoint(
        api_url: String,
        timeout: Duration,
        retry_base_delay: Duration,
    ) -> Result<Self, CompletionError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).no_proxy().build()?,
            api_key: "test-key".to_string(),
            api_url,
            timeout,
            retry_base_delay,
        })
    }

    /// Makes a raw call to the Claude API, returning the full response object.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff; the
    /// whole sequence, backoff included, must finish within the configured timeout.
    pub async fn call(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<LlmResponse, CompletionError> {
        with_deadline(self.timeout, self.call_with_retry(system, messages)).await
    }

    async fn call_with_retry(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<LlmResponse, CompletionError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages,
        };

        let mut last_error: Option<CompletionError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = self.retry_base_delay * (1 << (attempt - 1));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&self.api_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(CompletionError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(CompletionError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(CompletionError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let llm_response: LlmResponse = response.json().await?;

            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                llm_response.usage.input_tokens, llm_response.usage.output_tokens
            );

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(CompletionError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl Completer for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.converse(prompts::COMPLETION_SYSTEM, &[ChatMessage::user(prompt)])
            .await
    }

    async fn converse(
        &self,
        system: &str,
        transcript: &[ChatMessage],
    ) -> Result<String, CompletionError> {
        let response = self.call(system, transcript).await?;
        response
            .text()
            .map(str::to_string)
            .ok_or(CompletionError::EmptyContent)
    }
}

/// Bounds a completion future; expiry becomes `CompletionError::Timeout`.
async fn with_deadline<T, F>(timeout: Duration, fut: F) -> Result<T, CompletionError>
where
    F: Future<Output = Result<T, CompletionError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(CompletionError::Timeout {
            secs: timeout.as_secs(),
        }),
    }
}
