//! Language Service Module
//!
//! The engine treats the language model as an opaque text-completion oracle
//! behind the `LlmBackend` trait, injected at construction time.
//!
//! ## Backends
//!
//! - **GeminiBackend**: hosted Gemini `generateContent` over HTTPS (reqwest)
//! - **ScriptedBackend**: offline backend replaying scripted responses, for
//!   deterministic tests and dry runs
//!
//! Responses are untrusted text. Callers parse and validate them; a backend
//! only reports transport-level success or failure.

use async_trait::async_trait;
use thiserror::Error;

mod gemini;
mod scripted;

pub use gemini::GeminiBackend;
pub use scripted::ScriptedBackend;

/// Unified trait for language-service backends
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Send a prompt and return the raw completion text
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError>;

    /// Get the backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Transport-level failures from a language service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Rate limited by language service")]
    RateLimited,

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Language service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Language service returned no text")]
    EmptyResponse,

    #[error("Unreadable response body: {0}")]
    InvalidBody(String),
}

impl ServiceError {
    /// Whether a retry has a reasonable chance of succeeding.
    ///
    /// Auth failures and client errors will fail identically on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Transport(_) | ServiceError::Timeout(_) | ServiceError::RateLimited => true,
            ServiceError::Status { status, .. } => *status >= 500,
            ServiceError::Auth(_) | ServiceError::EmptyResponse | ServiceError::InvalidBody(_) => {
                false
            }
        }
    }
}
