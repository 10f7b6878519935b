//! LLM client abstraction.
//!
//! The scoring pipeline only needs "prompt in, raw text out". Provider wire
//! formats live in [`family`]; the HTTP transport with retries lives in
//! [`http`].

pub mod family;
pub mod http;

use async_trait::async_trait;
use thiserror::Error;

pub use family::ProviderFamily;
pub use http::HttpLlmClient;

/// A system + user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// System and user prompt joined for providers without a system role.
    pub fn combined(&self) -> String {
        if self.system.trim().is_empty() {
            self.user.clone()
        } else {
            format!("{}\n\n{}", self.system, self.user)
        }
    }
}

/// Errors from an LLM call.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed response envelope: {0}")]
    MalformedEnvelope(String),

    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<LlmError> },
}

impl LlmError {
    /// Whether the error is worth retrying.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::MalformedEnvelope(_) | Self::RetriesExhausted { .. } => false,
        }
    }
}

/// A backend that turns a prompt into raw response text.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name (e.g., "deepseek", "google").
    fn name(&self) -> &str;

    /// Send one prompt and return the raw payload text.
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;
}
