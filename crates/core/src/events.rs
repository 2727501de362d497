//! Normalized transport events
//!
//! The transport collaborator exposes its callback-style signals
//! (speaking-start listeners, stream end/error callbacks) as one
//! normalized event stream that the session loop consumes.

use serde::{Deserialize, Serialize};

/// Identity of a speaker in the voice channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpeakerId(pub u64);

impl std::fmt::Display for SpeakerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SpeakerId {
    fn from(id: u64) -> Self {
        SpeakerId(id)
    }
}

/// Events emitted by the voice transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A speaker started producing audio.
    SpeakingStarted {
        speaker: SpeakerId,
        /// True for bot accounts, including the relay's own playback voice.
        is_bot: bool,
    },
    /// A speaker's audio stream ended cleanly.
    StreamEnded { speaker: SpeakerId },
    /// A speaker's audio stream failed.
    StreamErrored { speaker: SpeakerId, cause: String },
}

impl TransportEvent {
    /// The speaker this event concerns.
    pub fn speaker(&self) -> SpeakerId {
        match self {
            TransportEvent::SpeakingStarted { speaker, .. }
            | TransportEvent::StreamEnded { speaker }
            | TransportEvent::StreamErrored { speaker, .. } => *speaker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_speaker_accessor() {
        let event = TransportEvent::SpeakingStarted {
            speaker: SpeakerId(7),
            is_bot: false,
        };
        assert_eq!(event.speaker(), SpeakerId(7));

        let event = TransportEvent::StreamErrored {
            speaker: SpeakerId(9),
            cause: "udp closed".into(),
        };
        assert_eq!(event.speaker(), SpeakerId(9));
        assert_eq!(event.speaker().to_string(), "9");
    }
}
