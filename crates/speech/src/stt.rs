//! HTTP speech-to-text client
//!
//! Wraps raw PCM into an in-memory WAV container and uploads it as a
//! multipart form, whisper-server style. The recognizer's JSON reply is
//! reduced to a trimmed transcript; "no speech" comes back as an empty
//! string, never an error.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use serde::Deserialize;

use voice_relay_core::{PcmBuffer, Result, SpeechToText};

use crate::SpeechError;

/// STT client configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    /// Transcription endpoint
    pub endpoint: String,
    /// BCP-47 language hint; only the primary subtag is sent
    pub language_code: String,
    /// Per-request deadline
    pub timeout: Duration,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8178/inference".to_string(),
            language_code: "en-US".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// HTTP speech-to-text backend
pub struct HttpStt {
    client: Client,
    config: SttConfig,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    text: String,
}

impl HttpStt {
    /// Create a new client.
    pub fn new(config: SttConfig) -> std::result::Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SpeechError::Stt(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Wrap raw 16-bit PCM into a WAV container in memory.
    ///
    /// The recognizer contract only promises to handle containerized
    /// audio; the transport hands us headerless PCM.
    fn wav_bytes(audio: &PcmBuffer) -> std::result::Result<Vec<u8>, SpeechError> {
        let spec = hound::WavSpec {
            channels: audio.format.channels,
            sample_rate: audio.format.sample_rate_hz,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| SpeechError::Stt(format!("wav header: {e}")))?;

        for sample in audio.data.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([sample[0], sample[1]]))
                .map_err(|e| SpeechError::Stt(format!("wav sample: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| SpeechError::Stt(format!("wav finalize: {e}")))?;

        Ok(cursor.into_inner())
    }

    fn language_subtag(&self) -> &str {
        self.config
            .language_code
            .split('-')
            .next()
            .unwrap_or(&self.config.language_code)
    }
}

#[async_trait]
impl SpeechToText for HttpStt {
    async fn recognize(&self, audio: &PcmBuffer) -> Result<String> {
        let wav = Self::wav_bytes(audio)?;
        let wav_len = wav.len();

        let form = multipart::Form::new()
            .part(
                "file",
                multipart::Part::bytes(wav)
                    .file_name("utterance.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| SpeechError::Stt(e.to_string()))?,
            )
            .text("response_format", "json")
            .text("language", self.language_subtag().to_string());

        let response = self
            .client
            .post(&self.config.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SpeechError::Stt(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Stt(format!("{status}: {body}")).into());
        }

        let parsed: InferenceResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::Stt(format!("bad response body: {e}")))?;

        let text = parsed.text.trim().to_string();
        tracing::debug!(
            wav_bytes = wav_len,
            duration_ms = audio.duration_ms(),
            transcript_chars = text.len(),
            "transcription finished"
        );

        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.config.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_relay_core::AudioFormat;

    #[test]
    fn wav_wrapping_adds_header() {
        let audio = PcmBuffer::new(vec![0u8; 960], AudioFormat::new(48_000, 2));
        let wav = HttpStt::wav_bytes(&audio).unwrap();

        // RIFF header plus all samples.
        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert!(wav.len() > 960);
    }

    #[test]
    fn language_subtag_is_primary() {
        let stt = HttpStt::new(SttConfig::default()).unwrap();
        assert_eq!(stt.language_subtag(), "en");

        let stt = HttpStt::new(SttConfig {
            language_code: "de".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(stt.language_subtag(), "de");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_stt_error() {
        let stt = HttpStt::new(SttConfig {
            endpoint: "http://127.0.0.1:1/inference".to_string(),
            timeout: Duration::from_millis(500),
            ..Default::default()
        })
        .unwrap();

        let audio = PcmBuffer::new(vec![0u8; 4000], AudioFormat::default());
        let err = stt.recognize(&audio).await.unwrap_err();
        assert!(matches!(err, voice_relay_core::Error::Stt(_)));
    }
}
