//! Core traits and types for the voice relay
//!
//! This crate provides foundational types used across all other crates:
//! - Collaborator traits (STT, TTS, chat model, voice transport)
//! - PCM audio buffer types
//! - Conversation turn types
//! - Normalized transport events
//! - Error types

pub mod audio;
pub mod conversation;
pub mod error;
pub mod events;
pub mod traits;
pub mod voice_config;

pub use audio::{AudioFormat, AudioSource, PcmBuffer, BYTES_PER_SAMPLE};
pub use conversation::{Turn, TurnRole};
pub use error::{ChatFailure, Error, Result};
pub use events::{SpeakerId, TransportEvent};
pub use voice_config::VoiceConfig;

pub use traits::{ChatModel, SpeechToText, TextToSpeech, VoiceTransport};
