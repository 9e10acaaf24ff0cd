// Completion backend abstraction plus the OpenAI-compatible client used
// in production. Seed generation and guess evaluation both talk to the
// model through `CompletionBackend`, so tests swap in scripted doubles.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::metrics::COMPLETION_DURATION_SECONDS;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum CompletionError {
    /// No API key configured. Not an authentication failure: callers
    /// degrade to canned behavior instead of aborting.
    #[error("no completion API key configured")]
    MissingApiKey,

    #[error("invalid completion request: {0}")]
    InvalidRequest(String),

    #[error("completion authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("completion rate limit exceeded")]
    RateLimitExceeded,

    #[error("completion server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("completion request timed out")]
    Timeout,

    #[error("completion network error: {0}")]
    Network(String),

    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

impl CompletionError {
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            400 => CompletionError::InvalidRequest(body),
            401 | 403 => CompletionError::AuthenticationFailed(body),
            429 => CompletionError::RateLimitExceeded,
            s => CompletionError::ServerError {
                status: s,
                message: body,
            },
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CompletionError::RateLimitExceeded
                | CompletionError::ServerError { .. }
                | CompletionError::Timeout
                | CompletionError::Network(_)
        )
    }

    /// True only for a rejected credential. A missing key is a
    /// configuration state, not a failed one.
    pub fn is_auth(&self) -> bool {
        matches!(self, CompletionError::AuthenticationFailed(_))
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CompletionError::Timeout
        } else {
            CompletionError::Network(err.to_string())
        }
    }
}

/// A text-in, text-out completion model.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// False when the backend cannot possibly serve a request (no
    /// credentials). Lets callers skip prompt construction entirely.
    fn is_configured(&self) -> bool {
        true
    }

    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, CompletionError>;
}

// ── OpenAI chat completions ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Client for the OpenAI chat completions endpoint. Works against any
/// OpenAI-compatible server via `base_url`.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    fn is_configured(&self) -> bool {
        self.has_api_key()
    }

    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, CompletionError> {
        let api_key = self.api_key.as_deref().ok_or(CompletionError::MissingApiKey)?;
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            temperature,
            max_tokens,
        };

        let timer = COMPLETION_DURATION_SECONDS.start_timer();
        let response = self
            .http
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;
        timer.observe_duration();

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::from_status(status, body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                CompletionError::MalformedResponse("response has no message content".to_string())
            })?;
        debug!(model = %self.model, chars = content.len(), "completion received");
        Ok(content)
    }
}
