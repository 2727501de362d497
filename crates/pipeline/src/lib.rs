//! Per-speaker capture and turn-taking pipeline
//!
//! This crate is the heart of the relay:
//! - [`CaptureSession`] - per-speaker capture state machine with silence
//!   and hard safety timers
//! - [`TranscriptionGate`] - response-likelihood policy over transcripts
//! - [`ConversationMemory`] - bounded rolling history with a pinned
//!   persona turn
//! - [`TempArtifactStore`] - transient audio artifacts with guaranteed
//!   cleanup
//! - [`PlaybackController`] - playback with completion signaling and a
//!   speaking flag
//! - [`TurnCoordinator`] - the single-flight transcribe → gate → respond
//!   → synthesize → play pipeline
//! - [`VoiceSessionRegistry`] - one session (and one coordinator) per
//!   voice channel, owned by the application root

pub mod artifacts;
pub mod capture;
pub mod coordinator;
pub mod gate;
pub mod memory;
pub mod playback;
pub mod registry;

pub use artifacts::{ArtifactOwner, TempArtifact, TempArtifactStore};
pub use capture::{
    drive_capture, CaptureConfig, CaptureEnd, CaptureSession, CapturedUtterance, CloseCause,
    SpeakerRoster, SpeakerSlot,
};
pub use coordinator::{
    Backends, CaptureRejection, CoordinatorConfig, CoordinatorStatus, TurnCoordinator, TurnOutcome,
};
pub use gate::{GateConfig, GateDecision, TranscriptionGate};
pub use memory::{ConversationMemory, MemoryConfig};
pub use playback::{PlaybackConfig, PlaybackController};
pub use registry::{SessionConfig, VoiceSession, VoiceSessionRegistry};
