//! Error types shared across the relay crates

use thiserror::Error;

/// Convenience result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure classes for the chat backend.
///
/// The turn pipeline never surfaces raw backend errors to playback;
/// instead each class maps to a fixed, user-legible fallback sentence so
/// operators can tell from transcripts which failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatFailure {
    /// Backend could not be reached at all.
    Unreachable,
    /// Backend did not answer within the configured deadline.
    Timeout,
    /// The configured model is not known to the backend.
    ModelMissing,
    /// The backend answered, but the reply could not be understood.
    Malformed,
}

impl ChatFailure {
    /// Fixed fallback sentence spoken in place of a reply.
    pub fn fallback_reply(&self) -> &'static str {
        match self {
            ChatFailure::Unreachable => {
                "Sorry, I can't reach my language model right now. Please try again in a moment."
            }
            ChatFailure::Timeout => {
                "Sorry, that took too long to think about. Could you ask me again?"
            }
            ChatFailure::ModelMissing => {
                "My language model seems to be missing. Someone should check my configuration."
            }
            ChatFailure::Malformed => {
                "I got a garbled answer back from my language model. Let's try that once more."
            }
        }
    }
}

/// Top-level error type for the relay.
#[derive(Error, Debug)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("speech-to-text error: {0}")]
    Stt(String),

    #[error("text-to-speech error: {0}")]
    Tts(String),

    #[error("chat backend failed ({kind:?}): {message}")]
    Chat { kind: ChatFailure, message: String },

    #[error("capture error: {0}")]
    Capture(String),

    #[error("playback error: {0}")]
    Playback(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a chat backend error with its failure class.
    pub fn chat(kind: ChatFailure, message: impl Into<String>) -> Self {
        Error::Chat {
            kind,
            message: message.into(),
        }
    }

    /// The chat failure class, if this is a chat backend error.
    pub fn chat_failure(&self) -> Option<ChatFailure> {
        match self {
            Error::Chat { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_replies_are_distinct() {
        let replies = [
            ChatFailure::Unreachable.fallback_reply(),
            ChatFailure::Timeout.fallback_reply(),
            ChatFailure::ModelMissing.fallback_reply(),
            ChatFailure::Malformed.fallback_reply(),
        ];
        for (i, a) in replies.iter().enumerate() {
            for b in replies.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn chat_failure_is_recoverable_from_error() {
        let err = Error::chat(ChatFailure::Timeout, "deadline exceeded");
        assert_eq!(err.chat_failure(), Some(ChatFailure::Timeout));
        assert_eq!(Error::Stt("x".into()).chat_failure(), None);
    }
}
