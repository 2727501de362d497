//! Synthesis voice configuration

use serde::{Deserialize, Serialize};

/// Voice parameters passed to the TTS backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Backend voice identifier (e.g. "en-US-Standard-C").
    pub voice_name: String,
    /// BCP-47 language code.
    pub language_code: String,
    /// Speaking rate multiplier (1.0 = normal).
    pub speaking_rate: f32,
    /// Pitch adjustment in semitones (0.0 = default).
    pub pitch: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice_name: "en-US-Standard-C".to_string(),
            language_code: "en-US".to_string(),
            speaking_rate: 1.0,
            pitch: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_voice() {
        let voice = VoiceConfig::default();
        assert_eq!(voice.language_code, "en-US");
        assert_eq!(voice.speaking_rate, 1.0);
    }
}
