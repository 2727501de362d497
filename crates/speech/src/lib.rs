//! HTTP speech backends
//!
//! Implements the core speech traits against external services:
//! - [`HttpStt`] uploads WAV-wrapped PCM to a whisper-server style
//!   transcription endpoint.
//! - [`HttpTts`] posts a synthesis request and decodes the base64 audio
//!   reply.

pub mod stt;
pub mod tts;

pub use stt::{HttpStt, SttConfig};
pub use tts::{HttpTts, TtsConfig};

use thiserror::Error;

/// Speech backend errors
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("recognition failed: {0}")]
    Stt(String),

    #[error("synthesis failed: {0}")]
    Tts(String),
}

impl From<SpeechError> for voice_relay_core::Error {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::Stt(msg) => voice_relay_core::Error::Stt(msg),
            SpeechError::Tts(msg) => voice_relay_core::Error::Tts(msg),
        }
    }
}
