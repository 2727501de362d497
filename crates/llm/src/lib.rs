//! Chat backend integration
//!
//! Provides the Ollama-backed [`OllamaChat`] implementation of the core
//! [`voice_relay_core::ChatModel`] trait, with bounded timeouts, retry
//! with exponential backoff, and an error taxonomy that maps onto the
//! fixed fallback replies the pipeline speaks on failure.

pub mod backend;

pub use backend::{LlmConfig, OllamaChat};

use thiserror::Error;
use voice_relay_core::ChatFailure;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// The failure class used to pick a user-legible fallback reply.
    pub fn failure_class(&self) -> ChatFailure {
        match self {
            LlmError::Network(_) => ChatFailure::Unreachable,
            LlmError::Timeout(_) => ChatFailure::Timeout,
            LlmError::ModelNotFound(_) => ChatFailure::ModelMissing,
            LlmError::Api(_) | LlmError::InvalidResponse(_) | LlmError::Configuration(_) => {
                ChatFailure::Malformed
            }
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(0)
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for voice_relay_core::Error {
    fn from(err: LlmError) -> Self {
        voice_relay_core::Error::chat(err.failure_class(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classes() {
        assert_eq!(
            LlmError::Network("refused".into()).failure_class(),
            ChatFailure::Unreachable
        );
        assert_eq!(LlmError::Timeout(30_000).failure_class(), ChatFailure::Timeout);
        assert_eq!(
            LlmError::ModelNotFound("llama3.2:3b".into()).failure_class(),
            ChatFailure::ModelMissing
        );
        assert_eq!(
            LlmError::InvalidResponse("bad json".into()).failure_class(),
            ChatFailure::Malformed
        );
    }

    #[test]
    fn converts_into_core_error_with_class() {
        let core: voice_relay_core::Error = LlmError::Timeout(5000).into();
        assert_eq!(core.chat_failure(), Some(ChatFailure::Timeout));
    }
}
