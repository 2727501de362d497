//! PCM audio buffer types
//!
//! The transport hands the relay raw 16-bit little-endian PCM per
//! speaker; these types carry that data plus enough format information
//! for duration math and STT upload.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Bytes per sample for 16-bit PCM.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Sample format of a PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Samples per second per channel.
    pub sample_rate_hz: u32,
    /// Channel count (1 = mono, 2 = stereo).
    pub channels: u16,
}

impl AudioFormat {
    pub fn new(sample_rate_hz: u32, channels: u16) -> Self {
        Self {
            sample_rate_hz,
            channels,
        }
    }

    /// Raw PCM byte rate for this format.
    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate_hz as usize * self.channels as usize * BYTES_PER_SAMPLE
    }

    /// Duration represented by `byte_len` bytes of PCM in this format.
    pub fn duration_ms(&self, byte_len: usize) -> u64 {
        let rate = self.bytes_per_second();
        if rate == 0 {
            return 0;
        }
        (byte_len as u64 * 1000) / rate as u64
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        // Voice transports commonly decode to 48 kHz stereo.
        Self {
            sample_rate_hz: 48_000,
            channels: 2,
        }
    }
}

/// A finalized PCM capture, ready for transcription.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    pub data: Vec<u8>,
    pub format: AudioFormat,
}

impl PcmBuffer {
    pub fn new(data: Vec<u8>, format: AudioFormat) -> Self {
        Self { data, format }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        self.format.duration_ms(self.data.len())
    }
}

/// Playable audio handed to the transport.
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Encoded audio held in memory.
    Bytes(Vec<u8>),
    /// Encoded audio on disk (temp artifact path).
    File(PathBuf),
}

impl AudioSource {
    /// Short description for logging.
    pub fn describe(&self) -> String {
        match self {
            AudioSource::Bytes(b) => format!("{} bytes in memory", b.len()),
            AudioSource::File(p) => p.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_math() {
        let format = AudioFormat::new(48_000, 2);
        assert_eq!(format.bytes_per_second(), 192_000);
        // One second of stereo 48 kHz 16-bit PCM.
        assert_eq!(format.duration_ms(192_000), 1000);
        assert_eq!(format.duration_ms(96_000), 500);
        assert_eq!(format.duration_ms(0), 0);
    }

    #[test]
    fn buffer_duration() {
        let format = AudioFormat::new(16_000, 1);
        let buffer = PcmBuffer::new(vec![0u8; 32_000], format);
        assert_eq!(buffer.duration_ms(), 1000);
        assert!(!buffer.is_empty());
    }
}
