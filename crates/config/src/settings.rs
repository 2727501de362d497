//! Relay settings
//!
//! One immutable configuration structure with explicitly enumerated
//! fields, loaded at startup and validated before anything else runs.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Top-level settings tree.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub capture: CaptureSettings,

    #[serde(default)]
    pub gate: GateSettings,

    #[serde(default)]
    pub memory: MemorySettings,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub stt: SttSettings,

    #[serde(default)]
    pub tts: TtsSettings,

    #[serde(default)]
    pub playback: PlaybackSettings,
}

/// HTTP command surface and housekeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Interval between temp artifact sweeps (seconds)
    #[serde(default = "default_sweep_interval")]
    pub artifact_sweep_secs: u64,

    /// Maximum age before an unconsumed artifact is swept (seconds)
    #[serde(default = "default_artifact_max_age")]
    pub artifact_max_age_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_sweep_interval() -> u64 {
    300
}
fn default_artifact_max_age() -> u64 {
    600
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            artifact_sweep_secs: default_sweep_interval(),
            artifact_max_age_secs: default_artifact_max_age(),
        }
    }
}

/// Per-speaker capture behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Inactivity gap that finalizes a capture (milliseconds)
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold_ms: u64,

    /// Absolute maximum capture duration regardless of activity (milliseconds)
    #[serde(default = "default_hard_timeout")]
    pub hard_capture_timeout_ms: u64,

    /// How often the silence check runs (milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Buffers below this size are discarded as noise.
    ///
    /// Absolute byte count; proportional to sample rate and channel
    /// count, so deployments capturing at other formats should scale it
    /// (1000 bytes is ~5ms of 48 kHz stereo 16-bit PCM).
    #[serde(default = "default_min_viable_bytes")]
    pub min_viable_bytes: usize,

    /// Sample rate the transport decodes to
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: u32,

    /// Channel count the transport decodes to
    #[serde(default = "default_channels")]
    pub channels: u16,
}

fn default_silence_threshold() -> u64 {
    700
}
fn default_hard_timeout() -> u64 {
    10_000
}
fn default_poll_interval() -> u64 {
    100
}
fn default_min_viable_bytes() -> usize {
    1000
}
fn default_sample_rate() -> u32 {
    48_000
}
fn default_channels() -> u16 {
    2
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            silence_threshold_ms: default_silence_threshold(),
            hard_capture_timeout_ms: default_hard_timeout(),
            poll_interval_ms: default_poll_interval(),
            min_viable_bytes: default_min_viable_bytes(),
            sample_rate_hz: default_sample_rate(),
            channels: default_channels(),
        }
    }
}

/// Response-likelihood policy for transcribed utterances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSettings {
    /// Utterances shorter than this (trimmed chars) are rejected
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,

    /// Length at which an utterance counts as "long"
    #[serde(default = "default_long_chars")]
    pub long_utterance_chars: usize,

    /// Acceptance probability for long utterances
    #[serde(default = "default_accept_long")]
    pub accept_long_prob: f64,

    /// Acceptance probability for everything else
    #[serde(default = "default_accept_short")]
    pub accept_short_prob: f64,

    /// Bypass all filtering and respond to everything. Off by default;
    /// intended for interactive testing only.
    #[serde(default)]
    pub accept_all: bool,
}

fn default_min_chars() -> usize {
    3
}
fn default_long_chars() -> usize {
    20
}
fn default_accept_long() -> f64 {
    0.8
}
fn default_accept_short() -> f64 {
    0.4
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
            long_utterance_chars: default_long_chars(),
            accept_long_prob: default_accept_long(),
            accept_short_prob: default_accept_short(),
            accept_all: false,
        }
    }
}

/// Rolling conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Maximum stored turns, excluding the system persona turn
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,

    /// Persona instruction pinned as the first turn
    #[serde(default = "default_persona")]
    pub persona: String,
}

fn default_history_cap() -> usize {
    10
}
fn default_persona() -> String {
    "You are a friendly voice assistant sitting in a group voice channel. \
     Messages are prefixed with the speaker's name. Reply conversationally, \
     in two or three short sentences, with no markdown or lists."
        .to_string()
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            history_cap: default_history_cap(),
            persona: default_persona(),
        }
    }
}

/// Chat backend connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Model name/ID
    #[serde(default = "default_model")]
    pub model: String,

    /// Backend endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Per-request deadline (milliseconds)
    #[serde(default = "default_llm_timeout")]
    pub llm_timeout_ms: u64,

    /// Retry attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial retry backoff, doubled per attempt (milliseconds)
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

fn default_model() -> String {
    "llama3.2:3b".to_string()
}
fn default_llm_endpoint() -> String {
    "http://localhost:11434".to_string()
}
fn default_llm_timeout() -> u64 {
    30_000
}
fn default_max_retries() -> u32 {
    2
}
fn default_initial_backoff() -> u64 {
    100
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> usize {
    256
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_llm_endpoint(),
            llm_timeout_ms: default_llm_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Speech recognition backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttSettings {
    /// Transcription endpoint (whisper-server style)
    #[serde(default = "default_stt_endpoint")]
    pub endpoint: String,

    /// Language hint passed to the recognizer
    #[serde(default = "default_language")]
    pub language_code: String,

    /// Per-request deadline (milliseconds)
    #[serde(default = "default_stt_timeout")]
    pub stt_timeout_ms: u64,
}

fn default_stt_endpoint() -> String {
    "http://localhost:8178/inference".to_string()
}
fn default_language() -> String {
    "en-US".to_string()
}
fn default_stt_timeout() -> u64 {
    15_000
}

impl Default for SttSettings {
    fn default() -> Self {
        Self {
            endpoint: default_stt_endpoint(),
            language_code: default_language(),
            stt_timeout_ms: default_stt_timeout(),
        }
    }
}

/// Speech synthesis backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsSettings {
    /// Synthesis endpoint
    #[serde(default = "default_tts_endpoint")]
    pub endpoint: String,

    /// Voice identifier
    #[serde(default = "default_voice_name")]
    pub voice_name: String,

    /// BCP-47 language code
    #[serde(default = "default_language")]
    pub language_code: String,

    /// Speaking rate multiplier
    #[serde(default = "default_speaking_rate")]
    pub speaking_rate: f32,

    /// Pitch adjustment in semitones
    #[serde(default)]
    pub pitch: f32,

    /// Replies longer than this are truncated before synthesis
    #[serde(default = "default_tts_max_chars")]
    pub tts_max_chars: usize,

    /// Per-request deadline (milliseconds)
    #[serde(default = "default_tts_timeout")]
    pub tts_timeout_ms: u64,
}

fn default_tts_endpoint() -> String {
    "http://localhost:8179/synthesize".to_string()
}
fn default_voice_name() -> String {
    "en-US-Standard-C".to_string()
}
fn default_speaking_rate() -> f32 {
    1.0
}
fn default_tts_max_chars() -> usize {
    1000
}
fn default_tts_timeout() -> u64 {
    15_000
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            endpoint: default_tts_endpoint(),
            voice_name: default_voice_name(),
            language_code: default_language(),
            speaking_rate: default_speaking_rate(),
            pitch: 0.0,
            tts_max_chars: default_tts_max_chars(),
            tts_timeout_ms: default_tts_timeout(),
        }
    }
}

/// Reply playback bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Maximum time to wait for playback completion (milliseconds)
    #[serde(default = "default_playback_timeout")]
    pub playback_timeout_ms: u64,
}

fn default_playback_timeout() -> u64 {
    30_000
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            playback_timeout_ms: default_playback_timeout(),
        }
    }
}

impl Settings {
    /// Validate the loaded settings.
    ///
    /// Called once at startup; a failure here aborts the process before
    /// any session is created.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn require(ok: bool, field: &str, message: &str) -> Result<(), ConfigError> {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: message.to_string(),
                })
            }
        }

        require(
            self.capture.silence_threshold_ms > 0,
            "capture.silence_threshold_ms",
            "must be positive",
        )?;
        require(
            self.capture.poll_interval_ms > 0,
            "capture.poll_interval_ms",
            "must be positive",
        )?;
        require(
            self.capture.hard_capture_timeout_ms > self.capture.silence_threshold_ms,
            "capture.hard_capture_timeout_ms",
            "must exceed the silence threshold",
        )?;
        require(
            self.capture.sample_rate_hz > 0,
            "capture.sample_rate_hz",
            "must be positive",
        )?;
        require(
            (1..=2).contains(&self.capture.channels),
            "capture.channels",
            "must be 1 or 2",
        )?;
        require(
            (0.0..=1.0).contains(&self.gate.accept_long_prob),
            "gate.accept_long_prob",
            "must be within [0, 1]",
        )?;
        require(
            (0.0..=1.0).contains(&self.gate.accept_short_prob),
            "gate.accept_short_prob",
            "must be within [0, 1]",
        )?;
        require(self.gate.min_chars >= 1, "gate.min_chars", "must be at least 1")?;
        require(
            self.memory.history_cap >= 1,
            "memory.history_cap",
            "must be at least 1",
        )?;
        require(
            !self.memory.persona.trim().is_empty(),
            "memory.persona",
            "must not be blank",
        )?;
        require(
            self.tts.tts_max_chars >= 8,
            "tts.tts_max_chars",
            "must be at least 8",
        )?;
        require(self.llm.llm_timeout_ms > 0, "llm.llm_timeout_ms", "must be positive")?;
        require(self.stt.stt_timeout_ms > 0, "stt.stt_timeout_ms", "must be positive")?;
        require(self.tts.tts_timeout_ms > 0, "tts.tts_timeout_ms", "must be positive")?;
        require(
            self.playback.playback_timeout_ms > 0,
            "playback.playback_timeout_ms",
            "must be positive",
        )?;

        Ok(())
    }
}

/// Load settings from an optional TOML file plus environment overrides.
///
/// Environment variables use the `VOICE_RELAY_` prefix with `__` as the
/// section separator, e.g. `VOICE_RELAY_CAPTURE__SILENCE_THRESHOLD_MS=900`.
pub fn load_settings(path: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::with_name(path).required(false));
    }

    let loaded = builder
        .add_source(
            config::Environment::with_prefix("VOICE_RELAY")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings: Settings = loaded.try_deserialize()?;
    settings.validate()?;

    tracing::debug!(
        silence_ms = settings.capture.silence_threshold_ms,
        hard_ms = settings.capture.hard_capture_timeout_ms,
        history_cap = settings.memory.history_cap,
        model = %settings.llm.model,
        "settings loaded"
    );

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.capture.silence_threshold_ms, 700);
        assert_eq!(settings.capture.hard_capture_timeout_ms, 10_000);
        assert_eq!(settings.capture.min_viable_bytes, 1000);
        assert_eq!(settings.memory.history_cap, 10);
        assert_eq!(settings.gate.accept_long_prob, 0.8);
        assert_eq!(settings.gate.accept_short_prob, 0.4);
        assert!(!settings.gate.accept_all);
        assert_eq!(settings.tts.tts_max_chars, 1000);
    }

    #[test]
    fn rejects_silence_above_hard_cap() {
        let mut settings = Settings::default();
        settings.capture.silence_threshold_ms = 20_000;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let mut settings = Settings::default();
        settings.gate.accept_long_prob = 1.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_zero_history_cap() {
        let mut settings = Settings::default();
        settings.memory.history_cap = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn loads_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[capture]\nsilence_threshold_ms = 900\n\n[memory]\nhistory_cap = 20\n"
        )
        .unwrap();

        let settings = load_settings(file.path().to_str()).unwrap();
        assert_eq!(settings.capture.silence_threshold_ms, 900);
        assert_eq!(settings.memory.history_cap, 20);
        // Untouched sections keep their defaults.
        assert_eq!(settings.gate.min_chars, 3);
    }
}
