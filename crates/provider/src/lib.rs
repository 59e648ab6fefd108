//! Completion model access for the exploration agent.
//!
//! One text-completion call per turn; transport failures are classified so
//! the agent can rotate models or shrink the prompt.

use serde::{Deserialize, Serialize};

use thiserror::Error;
use tracing::{debug, trace};

pub mod openai;

pub use openai::OpenAiProvider;

/// Model call failures
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("MODEL ENDPOINT UNREACHABLE: {0}")]
    Request(#[from] reqwest::Error),

    #[error("MALFORMED MODEL RESPONSE: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MODEL API REJECTED REQUEST: {0}")]
    Api(String),

    #[error("NO API KEY CONFIGURED")]
    NoApiKey,

    #[error("COMPLETION MISSING FROM RESPONSE")]
    InvalidResponse,

    #[error("RATE LIMITED")]
    RateLimited,

    #[error("PROMPT EXCEEDS CONTEXT WINDOW: {0}")]
    ContextLengthExceeded(String),
}

impl ProviderError {
    /// Throttling; the caller should switch models before retrying
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited)
    }

    /// The prompt does not fit the model's context window
    pub fn is_context_exceeded(&self) -> bool {
        matches!(self, ProviderError::ContextLengthExceeded(_))
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Text returned for one prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    #[serde(default)]
    pub finish_reason: String,
    #[serde(default)]
    pub usage: Usage,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            text: content.into(),
            finish_reason: "stop".to_string(),
            usage: Usage::default(),
        }
    }

    /// The model stopped because it ran out of tokens rather than hitting a stop sequence
    pub fn is_truncated(&self) -> bool {
        self.finish_reason == "length"
    }
}

/// Resource consumption
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Transmission parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stop: Vec<String>,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            model: String::new(),
            prompt: String::new(),
            max_tokens: 256,
            temperature: 0.0,
            stop: Vec::new(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

impl CompletionParams {
    /// Log a one-line summary of an outgoing request
    pub fn trace(&self) {
        trace!("◆ PROMPT:\n{}", self.prompt);
        debug!(
            "◆ REQUEST model={} max_tokens={} frequency_penalty={} presence_penalty={}",
            self.model, self.max_tokens, self.frequency_penalty, self.presence_penalty
        );
    }
}

/// A text-completion backend. The model to call travels in the params.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    async fn complete(&self, params: CompletionParams) -> Result<Completion>;
}
