//! Playback control
//!
//! Wraps the transport's play primitive with completion signaling, a
//! bounded wait, forced-stop semantics, and guaranteed artifact cleanup.
//! The speaking flag it exposes is what blocks new captures while the
//! relay's own audio is in the channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::time::Duration;

use voice_relay_core::{AudioSource, VoiceTransport};

use crate::artifacts::{TempArtifact, TempArtifactStore};

/// Playback configuration
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Maximum time to wait for playback completion
    pub playback_timeout: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            playback_timeout: Duration::from_secs(30),
        }
    }
}

/// Transport playback wrapper.
pub struct PlaybackController {
    transport: Arc<dyn VoiceTransport>,
    artifacts: Arc<TempArtifactStore>,
    config: PlaybackConfig,
    speaking: AtomicBool,
}

/// Clears the speaking flag however playback ends, including task
/// cancellation.
struct SpeakingGuard<'a>(&'a AtomicBool);

impl Drop for SpeakingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PlaybackController {
    pub fn new(
        transport: Arc<dyn VoiceTransport>,
        artifacts: Arc<TempArtifactStore>,
        config: PlaybackConfig,
    ) -> Self {
        Self {
            transport,
            artifacts,
            config,
            speaking: AtomicBool::new(false),
        }
    }

    /// Is relay audio currently in the channel?
    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    /// Play a synthesized artifact to completion.
    ///
    /// Returns `true` on natural completion, `false` on timeout or
    /// transport error. The artifact is deleted and the speaking flag
    /// cleared on every path.
    pub async fn play(&self, artifact: TempArtifact) -> bool {
        self.speaking.store(true, Ordering::SeqCst);
        let _speaking = SpeakingGuard(&self.speaking);

        let source = AudioSource::File(artifact.path.clone());
        let result = tokio::time::timeout(
            self.config.playback_timeout,
            self.transport.play(source),
        )
        .await;

        self.artifacts.remove(&artifact);

        match result {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "playback failed");
                false
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.playback_timeout.as_millis() as u64,
                    "playback timed out; forcing stop"
                );
                if let Err(e) = self.transport.stop_playback().await {
                    tracing::warn!(error = %e, "failed to stop stuck playback");
                }
                false
            }
        }
    }

    /// Forcibly end playback and clear the speaking flag.
    ///
    /// Used on session teardown.
    pub async fn stop(&self) {
        if let Err(e) = self.transport.stop_playback().await {
            tracing::warn!(error = %e, "failed to stop playback");
        }
        self.speaking.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactOwner;
    use voice_relay_transport::LoopbackTransport;

    fn controller(
        play_duration: Duration,
        timeout: Duration,
    ) -> (Arc<LoopbackTransport>, Arc<TempArtifactStore>, PlaybackController) {
        let transport = Arc::new(LoopbackTransport::with_play_duration("general", play_duration));
        let artifacts = Arc::new(TempArtifactStore::new().unwrap());
        let playback = PlaybackController::new(
            transport.clone(),
            artifacts.clone(),
            PlaybackConfig {
                playback_timeout: timeout,
            },
        );
        (transport, artifacts, playback)
    }

    #[tokio::test]
    async fn natural_completion_deletes_the_artifact() {
        let (transport, artifacts, playback) =
            controller(Duration::ZERO, Duration::from_secs(30));

        let artifact = artifacts
            .create(ArtifactOwner::Synthesis, "mp3", b"reply audio")
            .unwrap();
        let path = artifact.path.clone();

        assert!(playback.play(artifact).await);
        assert!(!playback.is_speaking());
        assert!(!path.exists());
        assert_eq!(artifacts.live_count(), 0);
        assert_eq!(transport.play_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_returns_false_and_still_cleans_up() {
        let (_transport, artifacts, playback) =
            controller(Duration::from_secs(300), Duration::from_millis(50));

        let artifact = artifacts
            .create(ArtifactOwner::Synthesis, "mp3", b"reply audio")
            .unwrap();
        let path = artifact.path.clone();

        assert!(!playback.play(artifact).await);
        assert!(!playback.is_speaking());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn speaking_flag_is_set_during_playback() {
        let (transport, artifacts, playback) =
            controller(Duration::from_secs(5), Duration::from_secs(30));
        let playback = Arc::new(playback);

        let artifact = artifacts
            .create(ArtifactOwner::Synthesis, "mp3", b"reply audio")
            .unwrap();

        let task = {
            let playback = playback.clone();
            tokio::spawn(async move { playback.play(artifact).await })
        };

        // Let the play call start.
        tokio::task::yield_now().await;
        assert!(playback.is_speaking());

        // Force-stop ends the loopback playback early.
        playback.stop().await;
        assert!(task.await.unwrap());
        assert!(!playback.is_speaking());
        assert_eq!(transport.play_count(), 1);
    }
}
