//! Application state and settings wiring

use std::sync::Arc;

use tokio::time::Duration;

use voice_relay_config::Settings;
use voice_relay_core::{AudioFormat, VoiceConfig};
use voice_relay_pipeline::{
    CaptureConfig, CoordinatorConfig, GateConfig, MemoryConfig, PlaybackConfig, SessionConfig,
    VoiceSessionRegistry,
};

/// Shared state behind the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<VoiceSessionRegistry>,
    pub metrics: metrics_exporter_prometheus::PrometheusHandle,
}

/// Map the immutable settings tree onto the pipeline's config structs.
pub fn session_config(settings: &Settings) -> SessionConfig {
    SessionConfig {
        capture: CaptureConfig {
            silence_threshold: Duration::from_millis(settings.capture.silence_threshold_ms),
            hard_timeout: Duration::from_millis(settings.capture.hard_capture_timeout_ms),
            poll_interval: Duration::from_millis(settings.capture.poll_interval_ms),
            min_viable_bytes: settings.capture.min_viable_bytes,
            format: AudioFormat::new(settings.capture.sample_rate_hz, settings.capture.channels),
        },
        gate: GateConfig {
            min_chars: settings.gate.min_chars,
            long_utterance_chars: settings.gate.long_utterance_chars,
            accept_long_prob: settings.gate.accept_long_prob,
            accept_short_prob: settings.gate.accept_short_prob,
            accept_all: settings.gate.accept_all,
        },
        memory: MemoryConfig {
            history_cap: settings.memory.history_cap,
            persona: settings.memory.persona.clone(),
        },
        coordinator: CoordinatorConfig {
            stt_timeout: Duration::from_millis(settings.stt.stt_timeout_ms),
            llm_timeout: Duration::from_millis(settings.llm.llm_timeout_ms),
            tts_timeout: Duration::from_millis(settings.tts.tts_timeout_ms),
            tts_max_chars: settings.tts.tts_max_chars,
            voice: VoiceConfig {
                voice_name: settings.tts.voice_name.clone(),
                language_code: settings.tts.language_code.clone(),
                speaking_rate: settings.tts.speaking_rate,
                pitch: settings.tts.pitch,
            },
        },
        playback: PlaybackConfig {
            playback_timeout: Duration::from_millis(settings.playback.playback_timeout_ms),
        },
        retry: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_map_onto_pipeline_configs() {
        let mut settings = Settings::default();
        settings.capture.silence_threshold_ms = 900;
        settings.memory.history_cap = 20;
        settings.tts.tts_max_chars = 500;

        let config = session_config(&settings);
        assert_eq!(config.capture.silence_threshold, Duration::from_millis(900));
        assert_eq!(config.capture.hard_timeout, Duration::from_secs(10));
        assert_eq!(config.memory.history_cap, 20);
        assert_eq!(config.coordinator.tts_max_chars, 500);
        assert_eq!(config.capture.format.sample_rate_hz, 48_000);
    }
}
