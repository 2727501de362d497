//! Voice transport trait
//!
//! The transport owns connecting, decoding and playback at the wire
//! level. The relay consumes it through this narrow interface: a
//! normalized event stream, per-speaker PCM subscriptions, and a play
//! primitive that resolves on completion.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::{AudioSource, Result, SpeakerId, TransportEvent};

#[async_trait]
pub trait VoiceTransport: Send + Sync + 'static {
    /// Channel reference this transport is connected to.
    fn channel(&self) -> &str;

    /// Subscribe to the normalized transport event stream.
    fn events(&self) -> broadcast::Receiver<TransportEvent>;

    /// Subscribe to a speaker's decoded PCM byte stream.
    ///
    /// The receiver yields raw 16-bit PCM chunks and closes when the
    /// speaker's stream ends.
    async fn subscribe(&self, speaker: SpeakerId) -> Result<mpsc::Receiver<Vec<u8>>>;

    /// Play an audio resource into the channel.
    ///
    /// Resolves once playback has finished naturally or was stopped.
    async fn play(&self, source: AudioSource) -> Result<()>;

    /// Force-stop any in-flight playback.
    async fn stop_playback(&self) -> Result<()>;

    /// Disconnect from the channel.
    async fn leave(&self) -> Result<()>;
}
