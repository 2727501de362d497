//! Voice session registry
//!
//! One [`VoiceSession`] per joined channel, owned by an explicit
//! registry at the application root. A session wires the transport's
//! normalized event stream into its coordinator: speaking-start opens a
//! capture, stream errors abort it, finalized utterances enter the turn
//! pipeline in the order they finish.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use voice_relay_core::{Error, Result, SpeakerId, TransportEvent, VoiceTransport};
use voice_relay_transport::{connect_with_retry, RetryPolicy, TransportFactory};

use crate::artifacts::TempArtifactStore;
use crate::capture::{drive_capture, CaptureConfig};
use crate::coordinator::{Backends, CoordinatorConfig, TurnCoordinator};
use crate::gate::GateConfig;
use crate::memory::MemoryConfig;
use crate::playback::{PlaybackConfig, PlaybackController};

/// Everything needed to build one session's pipeline.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub capture: CaptureConfig,
    pub gate: GateConfig,
    pub memory: MemoryConfig,
    pub coordinator: CoordinatorConfig,
    pub playback: PlaybackConfig,
    pub retry: RetryPolicy,
}

/// A live voice session: transport plus coordinator plus event loop.
pub struct VoiceSession {
    channel: String,
    coordinator: Arc<TurnCoordinator>,
    transport: Arc<dyn VoiceTransport>,
    event_loop: JoinHandle<()>,
}

impl VoiceSession {
    fn spawn(
        channel: String,
        transport: Arc<dyn VoiceTransport>,
        coordinator: Arc<TurnCoordinator>,
    ) -> Arc<Self> {
        let events = transport.events();
        let event_loop = tokio::spawn(run_event_loop(
            channel.clone(),
            events,
            transport.clone(),
            coordinator.clone(),
        ));

        Arc::new(Self {
            channel,
            coordinator,
            transport,
            event_loop,
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn coordinator(&self) -> &Arc<TurnCoordinator> {
        &self.coordinator
    }

    /// Tear the session down: abort captures, stop playback, leave the
    /// channel, stop the event loop.
    async fn close(&self) {
        self.coordinator.shutdown().await;
        if let Err(e) = self.transport.leave().await {
            tracing::warn!(channel = %self.channel, error = %e, "transport leave failed");
        }
        self.event_loop.abort();
        tracing::info!(channel = %self.channel, "voice session closed");
    }
}

/// Consume transport events for one session.
async fn run_event_loop(
    channel: String,
    mut events: broadcast::Receiver<TransportEvent>,
    transport: Arc<dyn VoiceTransport>,
    coordinator: Arc<TurnCoordinator>,
) {
    loop {
        match events.recv().await {
            Ok(TransportEvent::SpeakingStarted { speaker, is_bot }) => {
                handle_speaking_started(&channel, &transport, &coordinator, speaker, is_bot).await;
            }
            Ok(TransportEvent::StreamErrored { speaker, cause }) => {
                tracing::warn!(channel = %channel, speaker = %speaker, %cause, "speaker stream errored");
                coordinator.abort_capture(speaker);
            }
            Ok(TransportEvent::StreamEnded { speaker }) => {
                // The capture driver observes the chunk channel closing
                // and finalizes on its own.
                tracing::debug!(channel = %channel, speaker = %speaker, "speaker stream ended");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(channel = %channel, skipped, "event stream lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                // The transport is gone for good. Release everything and
                // surface through the command layer: status shows the
                // session idle and a fresh join builds a new one.
                tracing::error!(channel = %channel, "transport event stream closed; session needs re-join");
                coordinator.shutdown().await;
                break;
            }
        }
    }
}

async fn handle_speaking_started(
    channel: &str,
    transport: &Arc<dyn VoiceTransport>,
    coordinator: &Arc<TurnCoordinator>,
    speaker: SpeakerId,
    is_bot: bool,
) {
    let (session, slot, abort) = match coordinator.begin_capture(speaker, is_bot) {
        Ok(parts) => parts,
        Err(rejection) => {
            tracing::debug!(channel, speaker = %speaker, ?rejection, "capture not opened");
            return;
        }
    };

    let chunks = match transport.subscribe(speaker).await {
        Ok(rx) => rx,
        Err(e) => {
            tracing::warn!(channel, speaker = %speaker, error = %e, "subscribe failed");
            // Dropping the slot releases the speaker immediately.
            drop(slot);
            return;
        }
    };

    let coordinator = coordinator.clone();
    tokio::spawn(async move {
        if let Some(utterance) = drive_capture(session, chunks, abort, slot).await {
            let outcome = coordinator.process_utterance(utterance).await;
            tracing::debug!(outcome = outcome.label(), "turn finished");
        }
    });
}

/// Registry of live voice sessions, one per channel.
pub struct VoiceSessionRegistry {
    sessions: RwLock<HashMap<String, Arc<VoiceSession>>>,
    factory: Arc<dyn TransportFactory>,
    backends: Backends,
    config: SessionConfig,
    artifacts: Arc<TempArtifactStore>,
}

impl VoiceSessionRegistry {
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        backends: Backends,
        config: SessionConfig,
        artifacts: Arc<TempArtifactStore>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            factory,
            backends,
            config,
            artifacts,
        }
    }

    /// Join a channel, creating its session. Joining an already-joined
    /// channel returns the existing session.
    pub async fn join(&self, channel: &str) -> Result<Arc<VoiceSession>> {
        if let Some(existing) = self.get(channel) {
            tracing::debug!(channel, "already joined");
            return Ok(existing);
        }

        let transport =
            connect_with_retry(self.factory.as_ref(), channel, &self.config.retry).await?;

        let playback = Arc::new(PlaybackController::new(
            transport.clone(),
            self.artifacts.clone(),
            self.config.playback.clone(),
        ));

        let coordinator = Arc::new(TurnCoordinator::new(
            self.config.coordinator.clone(),
            self.config.capture.clone(),
            self.config.gate.clone(),
            self.config.memory.clone(),
            self.backends.clone(),
            playback,
            self.artifacts.clone(),
        ));

        let session = VoiceSession::spawn(channel.to_string(), transport, coordinator);
        self.sessions
            .write()
            .insert(channel.to_string(), session.clone());

        tracing::info!(channel, "voice session joined");
        Ok(session)
    }

    /// Leave a channel, tearing its session down.
    pub async fn leave(&self, channel: &str) -> Result<()> {
        let session = self
            .sessions
            .write()
            .remove(channel)
            .ok_or_else(|| Error::Transport(format!("no active session for channel {channel}")))?;
        session.close().await;
        Ok(())
    }

    pub fn get(&self, channel: &str) -> Option<Arc<VoiceSession>> {
        self.sessions.read().get(channel).cloned()
    }

    /// Channels with a live session.
    pub fn list(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    pub fn artifact_store(&self) -> &Arc<TempArtifactStore> {
        &self.artifacts
    }

    /// Tear down every session (process shutdown).
    pub async fn shutdown(&self) {
        let drained: Vec<Arc<VoiceSession>> = self.sessions.write().drain().map(|(_, s)| s).collect();
        for session in drained {
            session.close().await;
        }
    }
}
