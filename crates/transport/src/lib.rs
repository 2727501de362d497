//! Transport glue
//!
//! The voice transport itself (wire protocol, codecs, authentication) is
//! an external collaborator. This crate holds what the relay needs on
//! its side of that boundary: a factory seam for joining channels,
//! bounded-retry reconnection, and an in-process loopback transport used
//! by tests and local runs.

pub mod loopback;

pub use loopback::{LoopbackFactory, LoopbackTransport};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use voice_relay_core::{Error, Result, VoiceTransport};

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to join channel {channel}: {message}")]
    Join { channel: String, message: String },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("playback error: {0}")]
    Playback(String),

    #[error("transport closed")]
    Closed,
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Error::Transport(err.to_string())
    }
}

/// Seam for joining voice channels.
///
/// The application root owns one factory; the session registry calls it
/// on join and again when a session has to reconnect.
#[async_trait]
pub trait TransportFactory: Send + Sync + 'static {
    async fn connect(&self, channel: &str) -> Result<Arc<dyn VoiceTransport>>;
}

/// Bounded-retry policy for joining a channel.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total connection attempts
    pub max_attempts: u32,
    /// Initial backoff, doubled per attempt
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
        }
    }
}

/// Connect with bounded retries and exponential backoff.
pub async fn connect_with_retry(
    factory: &dyn TransportFactory,
    channel: &str,
    policy: &RetryPolicy,
) -> Result<Arc<dyn VoiceTransport>> {
    let mut backoff = policy.initial_backoff;
    let mut last_error = None;

    for attempt in 0..policy.max_attempts {
        if attempt > 0 {
            tracing::warn!(
                channel,
                "transport join failed, retrying in {:?} (attempt {}/{})",
                backoff,
                attempt,
                policy.max_attempts - 1
            );
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }

        match factory.connect(channel).await {
            Ok(transport) => return Ok(transport),
            Err(e) => last_error = Some(e),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        TransportError::Join {
            channel: channel.to_string(),
            message: "no attempts configured".to_string(),
        }
        .into()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FlakyFactory {
        failures_left: Mutex<u32>,
        inner: LoopbackFactory,
    }

    #[async_trait]
    impl TransportFactory for FlakyFactory {
        async fn connect(&self, channel: &str) -> Result<Arc<dyn VoiceTransport>> {
            {
                let mut failures = self.failures_left.lock();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(TransportError::Join {
                        channel: channel.to_string(),
                        message: "simulated outage".to_string(),
                    }
                    .into());
                }
            }
            self.inner.connect(channel).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retry_recovers_from_transient_failures() {
        let factory = FlakyFactory {
            failures_left: Mutex::new(2),
            inner: LoopbackFactory::new(),
        };

        let transport = connect_with_retry(&factory, "general", &RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(transport.channel(), "general");
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gives_up_after_bounded_attempts() {
        let factory = FlakyFactory {
            failures_left: Mutex::new(10),
            inner: LoopbackFactory::new(),
        };

        let err = match connect_with_retry(&factory, "general", &RetryPolicy::default()).await {
            Ok(_) => panic!("expected connect_with_retry to fail"),
            Err(e) => e,
        };
        assert!(matches!(err, Error::Transport(_)));
        // Three attempts consumed.
        assert_eq!(*factory.failures_left.lock(), 7);
    }
}
