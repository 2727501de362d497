//! Collaborator traits
//!
//! Each external collaborator of the relay (speech recognition, speech
//! synthesis, chat model, voice transport) is specified as a trait so
//! backends can be swapped and tests can substitute mocks.

pub mod llm;
pub mod speech;
pub mod transport;

pub use llm::ChatModel;
pub use speech::{SpeechToText, TextToSpeech};
pub use transport::VoiceTransport;
