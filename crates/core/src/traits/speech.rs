//! Speech processing traits

use async_trait::async_trait;

use crate::{PcmBuffer, Result, VoiceConfig};

/// Speech-to-Text interface
///
/// Implementations:
/// - `HttpStt` - whisper-server style HTTP upload (voice-relay-speech)
///
/// # Example
///
/// ```ignore
/// let stt: Arc<dyn SpeechToText> = Arc::new(HttpStt::new(config)?);
/// let text = stt.recognize(&utterance).await?;
/// ```
#[async_trait]
pub trait SpeechToText: Send + Sync + 'static {
    /// Transcribe a finalized PCM capture.
    ///
    /// Returns the recognized text, or an empty string when the backend
    /// heard nothing it could transcribe. An empty result is not an
    /// error; the pipeline treats it as "nothing said".
    async fn recognize(&self, audio: &PcmBuffer) -> Result<String>;

    /// Model/backend name for logging.
    fn model_name(&self) -> &str;
}

/// Text-to-Speech interface
///
/// Implementations:
/// - `HttpTts` - REST synthesis returning encoded audio bytes
#[async_trait]
pub trait TextToSpeech: Send + Sync + 'static {
    /// Synthesize text to encoded audio (MP3 or PCM, backend-defined).
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>>;

    /// Model/backend name for logging.
    fn model_name(&self) -> &str;
}
