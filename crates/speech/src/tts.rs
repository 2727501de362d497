//! HTTP text-to-speech client

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use voice_relay_core::{Result, TextToSpeech, VoiceConfig};

use crate::SpeechError;

/// TTS client configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Synthesis endpoint
    pub endpoint: String,
    /// Per-request deadline
    pub timeout: Duration,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8179/synthesize".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// HTTP text-to-speech backend
///
/// Speaks the Google-TTS request shape: synthesis input plus voice and
/// audio config, answered with base64 MP3 bytes in `audioContent`.
pub struct HttpTts {
    client: Client,
    config: TtsConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfigBody,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    name: &'a str,
    language_code: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfigBody {
    audio_encoding: &'static str,
    speaking_rate: f32,
    pitch: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

impl HttpTts {
    /// Create a new client.
    pub fn new(config: TtsConfig) -> std::result::Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SpeechError::Tts(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl TextToSpeech for HttpTts {
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>> {
        let request = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                name: &voice.voice_name,
                language_code: &voice.language_code,
            },
            audio_config: AudioConfigBody {
                audio_encoding: "MP3",
                speaking_rate: voice.speaking_rate,
                pitch: voice.pitch,
            },
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| SpeechError::Tts(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Tts(format!("{status}: {body}")).into());
        }

        let parsed: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::Tts(format!("bad response body: {e}")))?;

        let audio = BASE64
            .decode(parsed.audio_content.as_bytes())
            .map_err(|e| SpeechError::Tts(format!("audio content not base64: {e}")))?;

        if audio.is_empty() {
            return Err(SpeechError::Tts("backend returned empty audio".to_string()).into());
        }

        tracing::debug!(chars = text.len(), audio_bytes = audio.len(), "synthesis finished");

        Ok(audio)
    }

    fn model_name(&self) -> &str {
        &self.config.endpoint
    }
}
