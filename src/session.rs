//! Session lifecycle controller
//!
//! Owns the microphone pipeline, the playback scheduler, and the remote
//! session handle, and serializes every lifecycle transition through one
//! state machine:
//!
//! ```text
//! Disconnected --connect()--> Connecting --Opened--> Connected
//!      ^                          |                     |
//!      |                        Error                 Error
//!      +------ disconnect() / Closed / Error ----------+
//! ```
//!
//! `Error` is terminal until an explicit new `connect()`. Teardown is shared
//! by disconnect, error, and close, and is safe to run repeatedly from any
//! state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::time::timeout;

use crate::audio::capture::{CapturePipeline, FrameHandler};
use crate::audio::codec;
use crate::audio::playback::{PLAYBACK_SAMPLE_RATE, PlaybackScheduler};
use crate::config::ClientConfig;
use crate::live::{LiveConfig, LiveConnector, LiveSession, ServerMessage, SessionEvent, SessionEvents};
use crate::transcript::{Speaker, TranscriptLog};
use crate::{Error, Result};

/// Connection status of the voice channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session and no audio resources held
    Disconnected,
    /// Audio acquired, handshake in flight
    Connecting,
    /// Session open; audio streaming in both directions
    Connected,
    /// The last connection failed; cleared by a new `connect()`
    Error,
}

/// Read-only view for UI consumers
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    /// Connection status
    pub status: SessionState,
    /// The local microphone currently carries speech
    pub is_user_speaking: bool,
    /// Scheduled playback is pending or audible
    pub is_bot_speaking: bool,
    /// Sends are suppressed (capture continues)
    pub is_muted: bool,
    /// Playback enqueue is suppressed (the stream continues)
    pub is_deafened: bool,
    /// Rolling transcript, newest first
    pub transcript: String,
}

/// Roster entry derived from a snapshot; computed per call, never persisted
#[derive(Debug, Clone)]
pub struct VoiceMember {
    /// Stable member id
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Speaking indicator
    pub is_speaking: bool,
    /// Whether this member is the remote voice
    pub is_bot: bool,
    /// Mute flag (always false for the bot)
    pub is_muted: bool,
    /// Deafen flag (always false for the bot)
    pub is_deafened: bool,
}

/// Whether `connect()` claims real devices or runs without hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AudioMode {
    /// Claim the default microphone and output device
    Hardware,
    /// No devices: playback runs detached and frames arrive via
    /// [`VoiceController::ingest_frame`]
    Headless,
}

/// State shared with the capture thread's frame callback
struct SendPath {
    muted: AtomicBool,
    user_speaking: AtomicBool,
    /// Filled once the session handshake resolves
    session: Mutex<Option<Arc<dyn LiveSession>>>,
    /// Frames produced before the handle resolved; dropped, never queued
    dropped_frames: AtomicU64,
}

impl SendPath {
    fn new() -> Self {
        Self {
            muted: AtomicBool::new(false),
            user_speaking: AtomicBool::new(false),
            session: Mutex::new(None),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Process one captured frame on the device thread.
    ///
    /// Mute suppresses the send, not the speaking indicator.
    fn ingest(&self, frame: &[f32], is_speaking: bool) {
        self.user_speaking.store(is_speaking, Ordering::SeqCst);

        if self.muted.load(Ordering::SeqCst) {
            return;
        }

        let Ok(slot) = self.session.lock() else {
            return;
        };
        if let Some(session) = slot.as_ref() {
            session.send_realtime_input(codec::encode_frame(frame));
        } else {
            self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("dropped frame produced before session resolved");
        }
    }

    fn take_session(&self) -> Option<Arc<dyn LiveSession>> {
        self.session.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// Supervises one voice connection at a time
///
/// Exactly one controller owns the microphone, the playback engine, and the
/// session handle; the state guard on `connect()` forbids concurrent
/// acquisition.
pub struct VoiceController {
    connector: Arc<dyn LiveConnector>,
    config: ClientConfig,
    audio_mode: AudioMode,
    state: SessionState,
    send_path: Arc<SendPath>,
    deafened: bool,
    transcript: TranscriptLog,
    capture: Option<CapturePipeline>,
    scheduler: Option<PlaybackScheduler>,
    events: Option<SessionEvents>,
}

impl VoiceController {
    /// Create a controller that claims real audio devices on connect
    #[must_use]
    pub fn new(connector: Arc<dyn LiveConnector>, config: ClientConfig) -> Self {
        Self::with_mode(connector, config, AudioMode::Hardware)
    }

    /// Create a controller that runs without audio hardware.
    ///
    /// Playback is scheduled against a manually advanced clock and no
    /// microphone is claimed; frames are fed through
    /// [`ingest_frame`](Self::ingest_frame). For tests and hosts that embed
    /// their own capture stack.
    #[must_use]
    pub fn headless(connector: Arc<dyn LiveConnector>, config: ClientConfig) -> Self {
        Self::with_mode(connector, config, AudioMode::Headless)
    }

    fn with_mode(
        connector: Arc<dyn LiveConnector>,
        config: ClientConfig,
        audio_mode: AudioMode,
    ) -> Self {
        let transcript = TranscriptLog::new(config.transcript_cap);
        Self {
            connector,
            config,
            audio_mode,
            state: SessionState::Disconnected,
            send_path: Arc::new(SendPath::new()),
            deafened: false,
            transcript,
            capture: None,
            scheduler: None,
            events: None,
        }
    }

    /// Acquire audio resources and begin the session handshake.
    ///
    /// No-op unless currently disconnected. The handshake is bounded by the
    /// configured connect timeout; state stays `Connecting` until the
    /// [`SessionEvent::Opened`] event arrives.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Acquisition`] or [`Error::Session`] on failure, after
    /// transitioning to the error state and tearing down
    pub async fn connect(&mut self) -> Result<()> {
        if self.state != SessionState::Disconnected {
            return Ok(());
        }
        self.state = SessionState::Connecting;
        tracing::info!("connecting voice session");

        match self.acquire_and_open().await {
            Ok(events) => {
                self.events = Some(events);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "voice connect failed");
                self.state = SessionState::Error;
                self.teardown();
                Err(e)
            }
        }
    }

    async fn acquire_and_open(&mut self) -> Result<SessionEvents> {
        self.scheduler = Some(match self.audio_mode {
            AudioMode::Hardware => PlaybackScheduler::open()?,
            AudioMode::Headless => PlaybackScheduler::detached(),
        });
        if self.audio_mode == AudioMode::Hardware {
            self.capture = Some(CapturePipeline::open()?);
        }

        let live = LiveConfig::from_client(&self.config);
        match timeout(self.config.connect_timeout(), self.connector.connect(live)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Session("session handshake timed out".to_string())),
        }
    }

    /// Tear down the connection and return to `Disconnected`.
    ///
    /// Callable from any state; repeated calls are no-ops.
    pub fn disconnect(&mut self) {
        if self.state != SessionState::Disconnected {
            tracing::info!("disconnecting voice session");
        }
        self.teardown();
        self.state = SessionState::Disconnected;
    }

    /// Apply one session event to the state machine
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Opened(session) => self.on_opened(session),
            SessionEvent::Message(message) => self.on_message(&message),
            SessionEvent::Error(reason) => {
                tracing::error!(%reason, "session error");
                self.state = SessionState::Error;
                self.teardown();
            }
            SessionEvent::Closed => {
                tracing::info!("session closed");
                self.teardown();
                self.state = SessionState::Disconnected;
            }
        }
    }

    /// Drain queued session events without waiting
    pub fn poll_events(&mut self) {
        loop {
            let Some(events) = self.events.as_mut() else {
                return;
            };
            match events.try_recv() {
                Ok(event) => self.handle_event(event),
                Err(_) => return,
            }
        }
    }

    /// Drive session events through the state machine until the channel
    /// closes or the connection is torn down
    pub async fn run_until_closed(&mut self) {
        while let Some(mut events) = self.events.take() {
            let Some(event) = events.recv().await else {
                break;
            };
            self.events = Some(events);
            self.handle_event(event);
        }
    }

    fn on_opened(&mut self, session: Arc<dyn LiveSession>) {
        if self.state != SessionState::Connecting {
            // Stray open after teardown; refuse the handle
            session.close();
            return;
        }

        if let Ok(mut slot) = self.send_path.session.lock() {
            *slot = Some(session);
        }
        self.state = SessionState::Connected;
        tracing::info!("voice session open");

        if let Some(capture) = self.capture.as_mut() {
            let send_path = Arc::clone(&self.send_path);
            let handler: FrameHandler =
                Arc::new(move |frame, is_speaking| send_path.ingest(frame, is_speaking));
            if let Err(e) = capture.start(handler) {
                tracing::error!(error = %e, "capture start failed");
                self.state = SessionState::Error;
                self.teardown();
            }
        }
    }

    fn on_message(&mut self, message: &ServerMessage) {
        if message.interrupted {
            // Barge-in: flush everything, including any chunk in this message
            if let Some(scheduler) = &self.scheduler {
                scheduler.interrupt();
            }
        } else if let Some(audio) = &message.audio {
            if !self.deafened {
                let decoded = codec::decode(&audio.data)
                    .and_then(|bytes| codec::decode_to_chunk(&bytes, PLAYBACK_SAMPLE_RATE, 1));
                match decoded {
                    Ok(chunk) => {
                        if let Some(scheduler) = &self.scheduler {
                            scheduler.enqueue(chunk);
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "dropping undecodable audio chunk"),
                }
            }
        }

        if let Some(text) = &message.input_transcription {
            self.transcript.push(Speaker::User, text);
        }
        if let Some(text) = &message.output_transcription {
            self.transcript.push(Speaker::Bot, text);
        }
    }

    /// Release every acquired resource; shared by disconnect, error, close.
    fn teardown(&mut self) {
        if let Some(session) = self.send_path.take_session() {
            session.close();
        }
        if let Some(capture) = self.capture.as_mut() {
            capture.stop();
        }
        self.capture = None;
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.shutdown();
        }
        self.scheduler = None;
        self.events = None;
        self.send_path.user_speaking.store(false, Ordering::SeqCst);
        tracing::debug!("voice resources released");
    }

    /// Feed one captured frame into the send path.
    ///
    /// The hardware capture pipeline calls the same path internally; this is
    /// the entry point for headless controllers.
    pub fn ingest_frame(&self, frame: &[f32], is_speaking: bool) {
        self.send_path.ingest(frame, is_speaking);
    }

    /// Suppress or resume the send path; capture keeps running either way
    pub fn set_muted(&self, muted: bool) {
        self.send_path.muted.store(muted, Ordering::SeqCst);
    }

    /// Suppress or resume playback enqueue; the remote stream continues.
    ///
    /// The deafened-implies-muted coupling belongs to the caller, not here.
    pub fn set_deafened(&mut self, deafened: bool) {
        self.deafened = deafened;
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Frames dropped because they were produced before the handle resolved
    #[must_use]
    pub fn dropped_frames(&self) -> u64 {
        self.send_path.dropped_frames.load(Ordering::Relaxed)
    }

    /// Rolling transcript text, newest first
    #[must_use]
    pub fn transcript(&self) -> &str {
        self.transcript.text()
    }

    /// Read-only view of the connection for UI consumers
    #[must_use]
    pub fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            status: self.state,
            is_user_speaking: self.send_path.user_speaking.load(Ordering::SeqCst),
            is_bot_speaking: self
                .scheduler
                .as_ref()
                .is_some_and(PlaybackScheduler::is_speaking),
            is_muted: self.send_path.muted.load(Ordering::SeqCst),
            is_deafened: self.deafened,
            transcript: self.transcript.text().to_string(),
        }
    }

    /// Derive the two-member voice roster from the current snapshot
    #[must_use]
    pub fn members(&self) -> [VoiceMember; 2] {
        let snapshot = self.snapshot();
        [
            VoiceMember {
                id: "bot",
                name: "Chorus Bot",
                is_speaking: snapshot.is_bot_speaking,
                is_bot: true,
                is_muted: false,
                is_deafened: false,
            },
            VoiceMember {
                id: "user",
                name: "You",
                is_speaking: snapshot.is_user_speaking,
                is_bot: false,
                is_muted: snapshot.is_muted,
                is_deafened: snapshot.is_deafened,
            },
        ]
    }

    /// Advance the detached playback clock of a headless controller.
    ///
    /// No-op when connected to real hardware (the render engine drives the
    /// clock there).
    pub fn advance_playback(&self, seconds: f64) {
        if self.audio_mode == AudioMode::Headless {
            if let Some(scheduler) = &self.scheduler {
                scheduler.advance(seconds);
            }
        }
    }
}

impl Drop for VoiceController {
    fn drop(&mut self) {
        self.teardown();
    }
}
