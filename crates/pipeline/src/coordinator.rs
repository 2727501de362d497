//! Turn coordination
//!
//! One [`TurnCoordinator`] exists per voice session. It enforces the
//! single-flight pipeline: at most one utterance at a time moves through
//! transcribe → gate → respond → synthesize → play, guarded by the
//! `busy` flag. Utterances arriving while busy are dropped, not queued.
//! Every terminal path, success or failure, releases the flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{timeout, Duration, Instant};

use voice_relay_core::{
    ChatFailure, ChatModel, SpeakerId, SpeechToText, TextToSpeech, VoiceConfig,
};

use crate::artifacts::{ArtifactOwner, TempArtifactStore};
use crate::capture::{CaptureConfig, CaptureSession, CapturedUtterance, SpeakerRoster, SpeakerSlot};
use crate::gate::{GateConfig, TranscriptionGate};
use crate::memory::{ConversationMemory, MemoryConfig};
use crate::playback::PlaybackController;

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Deadline for a transcription call
    pub stt_timeout: Duration,
    /// Deadline for a chat call
    pub llm_timeout: Duration,
    /// Deadline for a synthesis call
    pub tts_timeout: Duration,
    /// Replies longer than this are truncated before synthesis
    pub tts_max_chars: usize,
    /// Voice used for replies
    pub voice: VoiceConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            stt_timeout: Duration::from_secs(15),
            llm_timeout: Duration::from_secs(30),
            tts_timeout: Duration::from_secs(15),
            tts_max_chars: 1000,
            voice: VoiceConfig::default(),
        }
    }
}

/// External backends the pipeline calls out to.
#[derive(Clone)]
pub struct Backends {
    pub stt: Arc<dyn SpeechToText>,
    pub llm: Arc<dyn ChatModel>,
    pub tts: Arc<dyn TextToSpeech>,
}

/// Terminal outcome of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Reply synthesized and handed to playback
    Completed { playback_completed: bool },
    /// Dropped at entry because another turn was in flight
    DroppedBusy,
    /// Transcription was empty; nothing was said
    NothingHeard,
    /// Transcription call failed or timed out
    SttFailed,
    /// The gate decided not to respond
    GateRejected,
    /// Synthesis failed or timed out; turn aborted
    TtsFailed,
}

impl TurnOutcome {
    /// Stable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            TurnOutcome::Completed {
                playback_completed: true,
            } => "completed",
            TurnOutcome::Completed {
                playback_completed: false,
            } => "completed_playback_cut",
            TurnOutcome::DroppedBusy => "dropped_busy",
            TurnOutcome::NothingHeard => "nothing_heard",
            TurnOutcome::SttFailed => "stt_failed",
            TurnOutcome::GateRejected => "gate_rejected",
            TurnOutcome::TtsFailed => "tts_failed",
        }
    }
}

/// Why a capture could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureRejection {
    /// Speaker is a bot (including the relay's own playback voice)
    BotSpeaker,
    /// The relay is currently speaking
    BotSpeaking,
    /// The speaker already has an open capture
    AlreadyCapturing,
}

/// Point-in-time coordinator state, for the status command.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatus {
    pub busy: bool,
    pub bot_speaking: bool,
    pub active_captures: usize,
    pub remembered_turns: usize,
}

/// Releases the busy flag on every exit path.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Per-voice-session turn coordinator.
pub struct TurnCoordinator {
    config: CoordinatorConfig,
    capture_config: CaptureConfig,
    backends: Backends,
    playback: Arc<PlaybackController>,
    memory: ConversationMemory,
    gate: TranscriptionGate,
    artifacts: Arc<TempArtifactStore>,
    roster: Arc<SpeakerRoster>,
    busy: AtomicBool,
}

impl TurnCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        capture_config: CaptureConfig,
        gate: GateConfig,
        memory: MemoryConfig,
        backends: Backends,
        playback: Arc<PlaybackController>,
        artifacts: Arc<TempArtifactStore>,
    ) -> Self {
        Self {
            config,
            capture_config,
            backends,
            playback,
            memory: ConversationMemory::new(memory),
            gate: TranscriptionGate::new(gate),
            artifacts,
            roster: SpeakerRoster::new(),
            busy: AtomicBool::new(false),
        }
    }

    /// Open a capture for a speaker, if eligible.
    ///
    /// Rejected for bots, while the relay itself is speaking, and when
    /// the speaker already has an open capture.
    pub fn begin_capture(
        &self,
        speaker: SpeakerId,
        is_bot: bool,
    ) -> Result<(CaptureSession, SpeakerSlot, watch::Receiver<bool>), CaptureRejection> {
        if is_bot {
            return Err(CaptureRejection::BotSpeaker);
        }
        if self.playback.is_speaking() {
            return Err(CaptureRejection::BotSpeaking);
        }
        let (slot, abort) = self
            .roster
            .try_claim(speaker)
            .ok_or(CaptureRejection::AlreadyCapturing)?;

        let session = CaptureSession::new(speaker, self.capture_config.clone(), Instant::now());
        tracing::debug!(speaker = %speaker, "capture opened");
        Ok((session, slot, abort))
    }

    /// Signal the speaker's in-flight capture to abort (transport error).
    pub fn abort_capture(&self, speaker: SpeakerId) -> bool {
        self.roster.abort(speaker)
    }

    /// Run a finalized utterance through the pipeline.
    ///
    /// Entry guard: while a turn is in flight, further utterances are
    /// dropped with no state change.
    pub async fn process_utterance(&self, utterance: CapturedUtterance) -> TurnOutcome {
        let Some(_busy) = self.try_acquire_busy() else {
            tracing::info!(
                speaker = %utterance.speaker,
                bytes = utterance.audio.len(),
                "pipeline busy; dropping utterance"
            );
            return TurnOutcome::DroppedBusy;
        };

        let speaker_label = format!("speaker-{}", utterance.speaker);

        let text = match timeout(
            self.config.stt_timeout,
            self.backends.stt.recognize(&utterance.audio),
        )
        .await
        {
            Err(_) => {
                tracing::warn!(speaker = %utterance.speaker, "transcription timed out");
                return TurnOutcome::SttFailed;
            }
            Ok(Err(e)) => {
                tracing::warn!(speaker = %utterance.speaker, error = %e, "transcription failed");
                return TurnOutcome::SttFailed;
            }
            Ok(Ok(text)) => text,
        };

        let text = text.trim().to_string();
        if text.is_empty() {
            tracing::debug!(speaker = %utterance.speaker, "nothing recognized");
            return TurnOutcome::NothingHeard;
        }

        tracing::info!(speaker = %utterance.speaker, transcript = %text, "utterance transcribed");

        if !self.gate.should_respond(&text) {
            return TurnOutcome::GateRejected;
        }

        self.respond_and_speak(&speaker_label, &text).await
    }

    /// Gate-exempt text entry into the pipeline (the `ask` command).
    pub async fn ask(&self, name: &str, text: &str) -> TurnOutcome {
        let Some(_busy) = self.try_acquire_busy() else {
            tracing::info!(name, "pipeline busy; dropping ask");
            return TurnOutcome::DroppedBusy;
        };
        self.respond_and_speak(name, text).await
    }

    /// Synthesize and play arbitrary text, bypassing the chat backend
    /// and conversation memory (the `say` command).
    pub async fn say(&self, text: &str) -> TurnOutcome {
        let Some(_busy) = self.try_acquire_busy() else {
            tracing::info!("pipeline busy; dropping say");
            return TurnOutcome::DroppedBusy;
        };
        let speakable = truncate_for_tts(text, self.config.tts_max_chars);
        self.speak(&speakable).await
    }

    /// Respond to user text: record it, query the chat backend, record
    /// and speak the reply. Runs under the busy guard held by callers.
    async fn respond_and_speak(&self, name: &str, text: &str) -> TurnOutcome {
        self.memory.add_user(name, text);
        let history = self.memory.snapshot();

        let reply = match timeout(self.config.llm_timeout, self.backends.llm.chat(&history)).await
        {
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.llm_timeout.as_millis() as u64,
                    "chat backend timed out"
                );
                ChatFailure::Timeout.fallback_reply().to_string()
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "chat backend failed");
                e.chat_failure()
                    .unwrap_or(ChatFailure::Malformed)
                    .fallback_reply()
                    .to_string()
            }
            Ok(Ok(reply)) => reply,
        };

        self.memory.add_assistant(&reply);

        let speakable = truncate_for_tts(&reply, self.config.tts_max_chars);
        self.speak(&speakable).await
    }

    /// Synthesize text and play it into the channel.
    async fn speak(&self, text: &str) -> TurnOutcome {
        let audio = match timeout(
            self.config.tts_timeout,
            self.backends.tts.synthesize(text, &self.config.voice),
        )
        .await
        {
            Err(_) => {
                tracing::warn!("synthesis timed out");
                return TurnOutcome::TtsFailed;
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "synthesis failed");
                return TurnOutcome::TtsFailed;
            }
            Ok(Ok(audio)) => audio,
        };

        let artifact = match self
            .artifacts
            .create(ArtifactOwner::Synthesis, "mp3", &audio)
        {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::warn!(error = %e, "failed to stage reply audio");
                return TurnOutcome::TtsFailed;
            }
        };

        let playback_completed = self.playback.play(artifact).await;
        TurnOutcome::Completed { playback_completed }
    }

    fn try_acquire_busy(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BusyGuard(&self.busy))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Point-in-time state for the status command.
    pub fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            busy: self.is_busy(),
            bot_speaking: self.playback.is_speaking(),
            active_captures: self.roster.len(),
            remembered_turns: self.memory.len(),
        }
    }

    /// Clear conversation memory, retaining only the persona turn.
    pub fn reset_memory(&self) {
        self.memory.reset();
        tracing::info!("conversation memory reset");
    }

    /// Snapshot of the conversation history (persona first).
    pub fn history(&self) -> Vec<voice_relay_core::Turn> {
        self.memory.snapshot()
    }

    /// Abort captures and stop playback (session teardown).
    pub async fn shutdown(&self) {
        self.roster.abort_all();
        self.playback.stop().await;
    }
}

/// Trim a reply to the synthesis length budget, marking the cut.
fn truncate_for_tts(reply: &str, max_chars: usize) -> String {
    if reply.chars().count() <= max_chars {
        return reply.to_string();
    }
    let mut out: String = reply.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use voice_relay_core::{AudioFormat, Error, PcmBuffer, Result, Turn};
    use voice_relay_transport::LoopbackTransport;

    use crate::capture::CloseCause;
    use crate::playback::PlaybackConfig;

    struct ScriptedStt {
        transcript: String,
        fail: bool,
        calls: AtomicUsize,
    }

    impl ScriptedStt {
        fn saying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                transcript: text.to_string(),
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                transcript: String::new(),
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SpeechToText for ScriptedStt {
        async fn recognize(&self, _audio: &PcmBuffer) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::Stt("scripted failure".into()))
            } else {
                Ok(self.transcript.clone())
            }
        }

        fn model_name(&self) -> &str {
            "scripted-stt"
        }
    }

    struct ScriptedChat {
        reply: std::result::Result<String, ChatFailure>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedChat {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(kind: ChatFailure) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(kind),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(text: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedChat {
        async fn chat(&self, _history: &[Turn]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(kind) => Err(Error::chat(*kind, "scripted failure")),
            }
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "scripted-chat"
        }
    }

    struct ScriptedTts {
        fail: bool,
        last_text: Mutex<String>,
        calls: AtomicUsize,
    }

    impl ScriptedTts {
        fn working() -> Arc<Self> {
            Arc::new(Self {
                fail: false,
                last_text: Mutex::new(String::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                last_text: Mutex::new(String::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn last_text(&self) -> String {
            self.last_text.lock().clone()
        }
    }

    #[async_trait]
    impl TextToSpeech for ScriptedTts {
        async fn synthesize(&self, text: &str, _voice: &VoiceConfig) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_text.lock() = text.to_string();
            if self.fail {
                Err(Error::Tts("scripted failure".into()))
            } else {
                Ok(vec![0u8; 2048])
            }
        }

        fn model_name(&self) -> &str {
            "scripted-tts"
        }
    }

    struct Rig {
        coordinator: Arc<TurnCoordinator>,
        transport: Arc<LoopbackTransport>,
        artifacts: Arc<TempArtifactStore>,
    }

    fn rig(
        stt: Arc<ScriptedStt>,
        llm: Arc<ScriptedChat>,
        tts: Arc<ScriptedTts>,
    ) -> Rig {
        rig_with(stt, llm, tts, Duration::ZERO, CoordinatorConfig::default())
    }

    fn rig_with(
        stt: Arc<ScriptedStt>,
        llm: Arc<ScriptedChat>,
        tts: Arc<ScriptedTts>,
        play_duration: Duration,
        config: CoordinatorConfig,
    ) -> Rig {
        let transport = Arc::new(LoopbackTransport::with_play_duration("general", play_duration));
        let artifacts = Arc::new(TempArtifactStore::new().unwrap());
        let playback = Arc::new(PlaybackController::new(
            transport.clone(),
            artifacts.clone(),
            PlaybackConfig {
                playback_timeout: Duration::from_millis(200),
            },
        ));
        let coordinator = Arc::new(TurnCoordinator::new(
            config,
            CaptureConfig::default(),
            GateConfig::default(),
            MemoryConfig::default(),
            Backends { stt, llm, tts },
            playback,
            artifacts.clone(),
        ));
        Rig {
            coordinator,
            transport,
            artifacts,
        }
    }

    fn utterance(bytes: usize) -> CapturedUtterance {
        CapturedUtterance {
            speaker: SpeakerId(1),
            audio: PcmBuffer::new(vec![0u8; bytes], AudioFormat::default()),
            cause: CloseCause::Silence,
        }
    }

    #[tokio::test]
    async fn completed_turn_updates_memory_and_plays() {
        let stt = ScriptedStt::saying("what's the weather like");
        let llm = ScriptedChat::replying("I don't have weather data, sorry about that.");
        let tts = ScriptedTts::working();
        let rig = rig(stt.clone(), llm.clone(), tts.clone());

        let outcome = rig.coordinator.process_utterance(utterance(50_000)).await;
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                playback_completed: true
            }
        );

        let history = rig.coordinator.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].content, "speaker-1: what's the weather like");
        assert_eq!(history[2].content, "I don't have weather data, sorry about that.");

        assert_eq!(rig.transport.play_count(), 1);
        assert_eq!(rig.artifacts.live_count(), 0);
        assert!(!rig.coordinator.is_busy());
        assert!(!rig.coordinator.status().bot_speaking);
    }

    #[tokio::test]
    async fn empty_transcript_is_silent_and_unlocks() {
        let stt = ScriptedStt::saying("   ");
        let llm = ScriptedChat::replying("unused");
        let rig = rig(stt.clone(), llm.clone(), ScriptedTts::working());

        let outcome = rig.coordinator.process_utterance(utterance(50_000)).await;
        assert_eq!(outcome, TurnOutcome::NothingHeard);
        assert_eq!(llm.calls(), 0);
        assert_eq!(rig.coordinator.status().remembered_turns, 0);
        assert!(!rig.coordinator.is_busy());
    }

    #[tokio::test]
    async fn stt_failure_is_non_fatal() {
        let rig = rig(
            ScriptedStt::failing(),
            ScriptedChat::replying("unused"),
            ScriptedTts::working(),
        );

        let outcome = rig.coordinator.process_utterance(utterance(50_000)).await;
        assert_eq!(outcome, TurnOutcome::SttFailed);
        assert!(!rig.coordinator.is_busy());
        assert_eq!(rig.transport.play_count(), 0);
    }

    #[tokio::test]
    async fn gate_rejection_leaves_state_unchanged() {
        let rig = rig(
            ScriptedStt::saying("yeah"),
            ScriptedChat::replying("unused"),
            ScriptedTts::working(),
        );

        let outcome = rig.coordinator.process_utterance(utterance(50_000)).await;
        assert_eq!(outcome, TurnOutcome::GateRejected);
        assert_eq!(rig.coordinator.status().remembered_turns, 0);
        assert!(!rig.coordinator.is_busy());
    }

    #[tokio::test]
    async fn chat_failure_speaks_the_class_fallback() {
        let rig = rig(
            ScriptedStt::saying("what do you think about this plan"),
            ScriptedChat::failing(ChatFailure::Unreachable),
            ScriptedTts::working(),
        );

        let outcome = rig.coordinator.process_utterance(utterance(50_000)).await;
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                playback_completed: true
            }
        );

        let history = rig.coordinator.history();
        assert_eq!(
            history[2].content,
            ChatFailure::Unreachable.fallback_reply()
        );
        assert_eq!(rig.transport.play_count(), 1);
        assert!(!rig.coordinator.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn chat_timeout_speaks_the_timeout_fallback() {
        let llm = ScriptedChat::slow("too late", Duration::from_secs(120));
        let rig = rig(
            ScriptedStt::saying("what do you think about this plan"),
            llm,
            ScriptedTts::working(),
        );

        let outcome = rig.coordinator.process_utterance(utterance(50_000)).await;
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                playback_completed: true
            }
        );
        let history = rig.coordinator.history();
        assert_eq!(history[2].content, ChatFailure::Timeout.fallback_reply());
        assert!(!rig.coordinator.is_busy());
    }

    #[tokio::test]
    async fn tts_failure_aborts_the_turn_but_unlocks() {
        let rig = rig(
            ScriptedStt::saying("what do you think about this plan"),
            ScriptedChat::replying("a fine plan"),
            ScriptedTts::failing(),
        );

        let outcome = rig.coordinator.process_utterance(utterance(50_000)).await;
        assert_eq!(outcome, TurnOutcome::TtsFailed);
        assert_eq!(rig.transport.play_count(), 0);
        assert!(!rig.coordinator.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn playback_timeout_reports_an_incomplete_turn() {
        let rig = rig_with(
            ScriptedStt::saying("what do you think about this plan"),
            ScriptedChat::replying("a fine plan"),
            ScriptedTts::working(),
            Duration::from_secs(300),
            CoordinatorConfig::default(),
        );

        let outcome = rig.coordinator.process_utterance(utterance(50_000)).await;
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                playback_completed: false
            }
        );
        assert!(!rig.coordinator.is_busy());
        assert!(!rig.coordinator.status().bot_speaking);
        assert_eq!(rig.artifacts.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_pipeline_drops_the_second_utterance() {
        let stt = ScriptedStt::saying("what do you think about this plan");
        let llm = ScriptedChat::slow("a fine plan", Duration::from_secs(5));
        let rig = rig(stt.clone(), llm.clone(), ScriptedTts::working());

        let first = {
            let coordinator = rig.coordinator.clone();
            tokio::spawn(async move { coordinator.process_utterance(utterance(50_000)).await })
        };
        tokio::task::yield_now().await;
        assert!(rig.coordinator.is_busy());

        // Arrives mid-flight: dropped before transcription, no state change.
        let second = rig.coordinator.process_utterance(utterance(50_000)).await;
        assert_eq!(second, TurnOutcome::DroppedBusy);
        assert_eq!(stt.calls(), 1);

        assert_eq!(
            first.await.unwrap(),
            TurnOutcome::Completed {
                playback_completed: true
            }
        );
        assert!(!rig.coordinator.is_busy());
        assert_eq!(rig.coordinator.status().remembered_turns, 2);
    }

    #[tokio::test]
    async fn long_replies_are_truncated_before_synthesis() {
        let long_reply = "word ".repeat(400);
        let tts = ScriptedTts::working();
        let rig = rig(
            ScriptedStt::saying("what do you think about this plan"),
            ScriptedChat::replying(&long_reply),
            tts.clone(),
        );

        rig.coordinator.process_utterance(utterance(50_000)).await;

        let spoken = tts.last_text();
        assert_eq!(spoken.chars().count(), 1000);
        assert!(spoken.ends_with('…'));
        // Memory keeps the untruncated reply.
        assert_eq!(rig.coordinator.history()[2].content, long_reply);
    }

    #[tokio::test]
    async fn ask_bypasses_the_gate() {
        let llm = ScriptedChat::replying("sure thing");
        let rig = rig(ScriptedStt::saying("unused"), llm.clone(), ScriptedTts::working());

        // "yeah" would be gate-rejected as a filler if it arrived via capture.
        let outcome = rig.coordinator.ask("operator", "yeah").await;
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                playback_completed: true
            }
        );
        assert_eq!(llm.calls(), 1);
        assert_eq!(rig.coordinator.history()[1].content, "operator: yeah");
    }

    #[tokio::test]
    async fn say_plays_without_touching_memory() {
        let llm = ScriptedChat::replying("unused");
        let rig = rig(ScriptedStt::saying("unused"), llm.clone(), ScriptedTts::working());

        let outcome = rig.coordinator.say("announcement for the channel").await;
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                playback_completed: true
            }
        );
        assert_eq!(llm.calls(), 0);
        assert_eq!(rig.coordinator.status().remembered_turns, 0);
        assert_eq!(rig.transport.play_count(), 1);
    }

    #[tokio::test]
    async fn captures_are_rejected_for_bots_and_duplicates() {
        let rig = rig(
            ScriptedStt::saying("unused"),
            ScriptedChat::replying("unused"),
            ScriptedTts::working(),
        );

        assert_eq!(
            rig.coordinator.begin_capture(SpeakerId(1), true).err(),
            Some(CaptureRejection::BotSpeaker)
        );

        let first = rig.coordinator.begin_capture(SpeakerId(1), false);
        assert!(first.is_ok());
        assert_eq!(
            rig.coordinator.begin_capture(SpeakerId(1), false).err(),
            Some(CaptureRejection::AlreadyCapturing)
        );
        assert_eq!(rig.coordinator.status().active_captures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_capture_opens_while_the_relay_is_speaking() {
        let rig = rig_with(
            ScriptedStt::saying("unused"),
            ScriptedChat::replying("unused"),
            ScriptedTts::working(),
            Duration::from_millis(100),
            CoordinatorConfig::default(),
        );

        let say = {
            let coordinator = rig.coordinator.clone();
            tokio::spawn(async move { coordinator.say("hold on").await })
        };
        tokio::task::yield_now().await;
        assert!(rig.coordinator.status().bot_speaking);

        assert_eq!(
            rig.coordinator.begin_capture(SpeakerId(1), false).err(),
            Some(CaptureRejection::BotSpeaking)
        );

        say.await.unwrap();
        assert!(rig.coordinator.begin_capture(SpeakerId(1), false).is_ok());
    }

    #[test]
    fn truncation_marks_the_cut() {
        assert_eq!(truncate_for_tts("short", 1000), "short");

        let long = "x".repeat(1200);
        let cut = truncate_for_tts(&long, 1000);
        assert_eq!(cut.chars().count(), 1000);
        assert!(cut.ends_with('…'));
    }
}
