//! Per-speaker capture
//!
//! A [`CaptureSession`] accumulates one speaker's PCM stream into a
//! transcribable buffer. Two independent timers bound it:
//!
//! - the **silence timer** finalizes the capture once no chunk has
//!   arrived for the configured threshold; every chunk resets it;
//! - the **hard safety timer** finalizes the capture unconditionally at
//!   the configured maximum duration, so a stuck stream can never hold
//!   a speaker's slot forever. It is never reset.
//!
//! The state machine itself is synchronous and clock-agnostic (tests
//! drive it with explicit instants); [`drive_capture`] wires it to a
//! chunk channel, a poll ticker, and an abort signal.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, Instant, MissedTickBehavior};

use voice_relay_core::{AudioFormat, PcmBuffer, SpeakerId};

/// Capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Inactivity gap that finalizes a capture
    pub silence_threshold: Duration,
    /// Absolute maximum capture duration regardless of activity
    pub hard_timeout: Duration,
    /// How often the timers are checked
    pub poll_interval: Duration,
    /// Buffers below this size are discarded as noise
    pub min_viable_bytes: usize,
    /// Format of the incoming PCM
    pub format: AudioFormat,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            silence_threshold: Duration::from_millis(700),
            hard_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
            min_viable_bytes: 1000,
            format: AudioFormat::default(),
        }
    }
}

/// Why a capture closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCause {
    /// Silence threshold exceeded
    Silence,
    /// Hard safety timeout reached
    HardTimeout,
    /// The transport stream ended
    StreamEnded,
    /// Aborted (transport error or session teardown)
    Aborted,
}

/// A finalized, viable capture.
#[derive(Debug)]
pub struct CapturedUtterance {
    pub speaker: SpeakerId,
    pub audio: PcmBuffer,
    pub cause: CloseCause,
}

/// Result of closing a capture session.
#[derive(Debug)]
pub enum CaptureEnd {
    Utterance(CapturedUtterance),
    Discarded { cause: CloseCause, bytes: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureState {
    Capturing,
    Closed,
}

/// Per-speaker capture state machine.
pub struct CaptureSession {
    speaker: SpeakerId,
    config: CaptureConfig,
    buffer: Vec<u8>,
    started_at: Instant,
    last_activity: Instant,
    state: CaptureState,
}

impl CaptureSession {
    pub fn new(speaker: SpeakerId, config: CaptureConfig, now: Instant) -> Self {
        Self {
            speaker,
            config,
            buffer: Vec::new(),
            started_at: now,
            last_activity: now,
            state: CaptureState::Capturing,
        }
    }

    pub fn speaker(&self) -> SpeakerId {
        self.speaker
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn byte_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state == CaptureState::Closed
    }

    /// Append a chunk and refresh the activity timestamp.
    ///
    /// Chunks arriving after close are dropped.
    pub fn push_chunk(&mut self, chunk: &[u8], now: Instant) {
        if self.state == CaptureState::Closed {
            return;
        }
        self.buffer.extend_from_slice(chunk);
        self.last_activity = now;
    }

    /// Run the timer checks. Returns the capture end if a timer fired.
    ///
    /// The hard timer wins when both have expired.
    pub fn check(&mut self, now: Instant) -> Option<CaptureEnd> {
        if self.state == CaptureState::Closed {
            return None;
        }
        if now.duration_since(self.started_at) >= self.config.hard_timeout {
            return Some(self.close(CloseCause::HardTimeout));
        }
        if now.duration_since(self.last_activity) >= self.config.silence_threshold {
            return Some(self.close(CloseCause::Silence));
        }
        None
    }

    /// Finalize unconditionally (stream end, abort).
    pub fn finish(&mut self, cause: CloseCause) -> CaptureEnd {
        self.close(cause)
    }

    fn close(&mut self, cause: CloseCause) -> CaptureEnd {
        debug_assert_ne!(self.state, CaptureState::Closed, "capture closed twice");
        self.state = CaptureState::Closed;

        let bytes = self.buffer.len();
        // Aborted captures are never forwarded, whatever their size.
        if cause == CloseCause::Aborted || bytes < self.config.min_viable_bytes {
            return CaptureEnd::Discarded { cause, bytes };
        }

        CaptureEnd::Utterance(CapturedUtterance {
            speaker: self.speaker,
            audio: PcmBuffer::new(std::mem::take(&mut self.buffer), self.config.format),
            cause,
        })
    }
}

/// Membership of in-flight captures, one slot per speaker.
///
/// The slot entry doubles as the capture's abort handle. Exactly one
/// open capture may exist per speaker; the [`SpeakerSlot`] guard
/// releases the entry when the capture task ends, whatever path it took.
pub struct SpeakerRoster {
    inner: Mutex<HashMap<SpeakerId, watch::Sender<bool>>>,
}

impl SpeakerRoster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(HashMap::new()),
        })
    }

    /// Claim the speaker's slot. Fails when a capture is already open.
    pub fn try_claim(
        self: &Arc<Self>,
        speaker: SpeakerId,
    ) -> Option<(SpeakerSlot, watch::Receiver<bool>)> {
        let mut inner = self.inner.lock();
        if inner.contains_key(&speaker) {
            return None;
        }
        let (tx, rx) = watch::channel(false);
        inner.insert(speaker, tx);
        Some((
            SpeakerSlot {
                speaker,
                roster: Arc::clone(self),
            },
            rx,
        ))
    }

    /// Signal the speaker's in-flight capture to abort.
    pub fn abort(&self, speaker: SpeakerId) -> bool {
        match self.inner.lock().get(&speaker) {
            Some(tx) => tx.send(true).is_ok(),
            None => false,
        }
    }

    /// Abort every in-flight capture (session teardown).
    pub fn abort_all(&self) {
        for tx in self.inner.lock().values() {
            let _ = tx.send(true);
        }
    }

    pub fn contains(&self, speaker: SpeakerId) -> bool {
        self.inner.lock().contains_key(&speaker)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// RAII slot guard; dropping it releases the speaker's roster entry.
pub struct SpeakerSlot {
    speaker: SpeakerId,
    roster: Arc<SpeakerRoster>,
}

impl Drop for SpeakerSlot {
    fn drop(&mut self) {
        self.roster.inner.lock().remove(&self.speaker);
        tracing::trace!(speaker = %self.speaker, "capture slot released");
    }
}

/// Drive a capture session to completion.
///
/// Consumes the speaker's chunk stream, polls the timers at the
/// configured interval, and honors the abort signal. The slot guard is
/// dropped on return, releasing the speaker before any downstream
/// processing happens.
pub async fn drive_capture(
    mut session: CaptureSession,
    mut chunks: mpsc::Receiver<Vec<u8>>,
    mut abort: watch::Receiver<bool>,
    slot: SpeakerSlot,
) -> Option<CapturedUtterance> {
    let mut poll = tokio::time::interval(session.config().poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let end = loop {
        tokio::select! {
            maybe_chunk = chunks.recv() => match maybe_chunk {
                Some(chunk) => session.push_chunk(&chunk, Instant::now()),
                None => break session.finish(CloseCause::StreamEnded),
            },
            _ = poll.tick() => {
                if let Some(end) = session.check(Instant::now()) {
                    break end;
                }
            }
            changed = abort.changed() => {
                if changed.is_err() || *abort.borrow() {
                    break session.finish(CloseCause::Aborted);
                }
            }
        }
    };
    drop(slot);

    match end {
        CaptureEnd::Utterance(utterance) => {
            tracing::info!(
                speaker = %utterance.speaker,
                bytes = utterance.audio.len(),
                duration_ms = utterance.audio.duration_ms(),
                cause = ?utterance.cause,
                "capture finalized"
            );
            Some(utterance)
        }
        CaptureEnd::Discarded { cause, bytes } => {
            tracing::debug!(?cause, bytes, "capture discarded");
            None
        }
    }
}
