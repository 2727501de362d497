//! In-process loopback transport
//!
//! Stands in for the real voice transport in tests and local runs.
//! Audio and events are injected programmatically; playback records what
//! was played and completes after a configurable simulated duration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, Notify};

use voice_relay_core::{AudioSource, Result, SpeakerId, TransportEvent, VoiceTransport};

use crate::{TransportError, TransportFactory};

const EVENT_BUS_CAPACITY: usize = 64;
const CHUNK_CHANNEL_CAPACITY: usize = 64;

/// In-process transport implementation.
pub struct LoopbackTransport {
    channel: String,
    events_tx: broadcast::Sender<TransportEvent>,
    streams: Mutex<HashMap<SpeakerId, mpsc::Sender<Vec<u8>>>>,
    played: Mutex<Vec<String>>,
    play_duration: Duration,
    stop_playback: Notify,
    left: AtomicBool,
}

impl LoopbackTransport {
    pub fn new(channel: impl Into<String>) -> Self {
        Self::with_play_duration(channel, Duration::ZERO)
    }

    /// Loopback whose `play` takes `play_duration` of (tokio) time to
    /// complete, for exercising playback timeouts.
    pub fn with_play_duration(channel: impl Into<String>, play_duration: Duration) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            channel: channel.into(),
            events_tx,
            streams: Mutex::new(HashMap::new()),
            played: Mutex::new(Vec::new()),
            play_duration,
            stop_playback: Notify::new(),
            left: AtomicBool::new(false),
        }
    }

    /// Inject a speaking-start event.
    pub fn speaking_started(&self, speaker: SpeakerId, is_bot: bool) {
        let _ = self
            .events_tx
            .send(TransportEvent::SpeakingStarted { speaker, is_bot });
    }

    /// Feed a PCM chunk to a subscribed speaker stream.
    ///
    /// Returns false when nobody is subscribed for the speaker.
    pub async fn feed(&self, speaker: SpeakerId, chunk: Vec<u8>) -> bool {
        let sender = self.streams.lock().get(&speaker).cloned();
        match sender {
            Some(tx) => tx.send(chunk).await.is_ok(),
            None => false,
        }
    }

    /// End a speaker's stream cleanly.
    pub fn end_stream(&self, speaker: SpeakerId) {
        self.streams.lock().remove(&speaker);
        let _ = self.events_tx.send(TransportEvent::StreamEnded { speaker });
    }

    /// Fail a speaker's stream.
    ///
    /// Only the error event is emitted; the chunk channel stays open so
    /// the consumer tears the capture down through its abort path, not
    /// through a clean end-of-stream.
    pub fn fail_stream(&self, speaker: SpeakerId, cause: impl Into<String>) {
        let _ = self.events_tx.send(TransportEvent::StreamErrored {
            speaker,
            cause: cause.into(),
        });
    }

    /// Descriptions of everything played so far.
    pub fn played(&self) -> Vec<String> {
        self.played.lock().clone()
    }

    pub fn play_count(&self) -> usize {
        self.played.lock().len()
    }

    pub fn has_left(&self) -> bool {
        self.left.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceTransport for LoopbackTransport {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events_tx.subscribe()
    }

    async fn subscribe(&self, speaker: SpeakerId) -> Result<mpsc::Receiver<Vec<u8>>> {
        if self.left.load(Ordering::SeqCst) {
            return Err(TransportError::Closed.into());
        }
        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        // Replacing an existing sender closes the previous receiver.
        self.streams.lock().insert(speaker, tx);
        Ok(rx)
    }

    async fn play(&self, source: AudioSource) -> Result<()> {
        if self.left.load(Ordering::SeqCst) {
            return Err(TransportError::Closed.into());
        }
        self.played.lock().push(source.describe());

        if !self.play_duration.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.play_duration) => {}
                _ = self.stop_playback.notified() => {
                    tracing::debug!(channel = %self.channel, "playback force-stopped");
                }
            }
        }
        Ok(())
    }

    async fn stop_playback(&self) -> Result<()> {
        self.stop_playback.notify_waiters();
        Ok(())
    }

    async fn leave(&self) -> Result<()> {
        self.left.store(true, Ordering::SeqCst);
        self.streams.lock().clear();
        self.stop_playback.notify_waiters();
        Ok(())
    }
}

/// Factory producing loopback transports, one per channel.
pub struct LoopbackFactory {
    transports: Mutex<HashMap<String, Arc<LoopbackTransport>>>,
    play_duration: Duration,
}

impl LoopbackFactory {
    pub fn new() -> Self {
        Self::with_play_duration(Duration::ZERO)
    }

    pub fn with_play_duration(play_duration: Duration) -> Self {
        Self {
            transports: Mutex::new(HashMap::new()),
            play_duration,
        }
    }

    /// Get or create the loopback transport for a channel.
    ///
    /// Tests use this to inject audio and events into a session joined
    /// through the factory.
    pub fn transport(&self, channel: &str) -> Arc<LoopbackTransport> {
        self.transports
            .lock()
            .entry(channel.to_string())
            .or_insert_with(|| {
                Arc::new(LoopbackTransport::with_play_duration(
                    channel,
                    self.play_duration,
                ))
            })
            .clone()
    }
}

impl Default for LoopbackFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportFactory for LoopbackFactory {
    async fn connect(&self, channel: &str) -> Result<Arc<dyn VoiceTransport>> {
        Ok(self.transport(channel) as Arc<dyn VoiceTransport>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_and_feed() {
        let transport = LoopbackTransport::new("general");
        let speaker = SpeakerId(1);

        let mut rx = transport.subscribe(speaker).await.unwrap();
        assert!(transport.feed(speaker, vec![1, 2, 3]).await);
        assert_eq!(rx.recv().await.unwrap(), vec![1, 2, 3]);

        transport.end_stream(speaker);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn events_are_broadcast() {
        let transport = LoopbackTransport::new("general");
        let mut events = transport.events();

        transport.speaking_started(SpeakerId(5), false);
        match events.recv().await.unwrap() {
            TransportEvent::SpeakingStarted { speaker, is_bot } => {
                assert_eq!(speaker, SpeakerId(5));
                assert!(!is_bot);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn play_records_sources() {
        let transport = LoopbackTransport::new("general");
        transport
            .play(AudioSource::Bytes(vec![0u8; 16]))
            .await
            .unwrap();
        assert_eq!(transport.play_count(), 1);
    }

    #[tokio::test]
    async fn leave_closes_the_transport() {
        let transport = LoopbackTransport::new("general");
        transport.leave().await.unwrap();
        assert!(transport.has_left());
        assert!(transport.subscribe(SpeakerId(1)).await.is_err());
        assert!(transport.play(AudioSource::Bytes(vec![])).await.is_err());
    }

    #[tokio::test]
    async fn factory_returns_same_transport_per_channel() {
        let factory = LoopbackFactory::new();
        let a = factory.transport("general");
        let b = factory.transport("general");
        assert!(Arc::ptr_eq(&a, &b));

        let connected = factory.connect("general").await.unwrap();
        assert_eq!(connected.channel(), "general");
    }
}
