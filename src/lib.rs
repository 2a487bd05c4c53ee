//! Chorus client - real-time voice chat core for conversational AI services
//!
//! This library provides the streaming heart of a voice-and-text chat
//! client: it captures microphone audio, feeds it to a remote
//! conversational-audio session, and plays the synthesized reply back with
//! no gaps, while handling barge-in interruption, mute/deafen controls, and
//! the connect/error/close lifecycle.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     Front end                        │
//! │   roster  │  controls  │  transcript  │  text chat   │
//! └────────────────────┬─────────────────────────────────┘
//!                      │ snapshot / connect / mute
//! ┌────────────────────▼─────────────────────────────────┐
//! │              VoiceController (lifecycle)             │
//! │   Capture ──► PCM codec ──► session send path        │
//! │   Playback ◄─ PCM codec ◄─ session events            │
//! └────────────────────┬─────────────────────────────────┘
//!                      │ LiveConnector / LiveSession
//! ┌────────────────────▼─────────────────────────────────┐
//! │        Remote conversational-audio service           │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The remote session protocol and the visual UI are external collaborators;
//! the library owns everything between the audio devices and the session's
//! message contract.

pub mod audio;
pub mod config;
pub mod error;
pub mod live;
pub mod session;
pub mod transcript;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use live::{
    InlineAudio, LiveConfig, LiveConnector, LiveSession, Modality, ServerMessage, SessionEvent,
    SessionEvents,
};
pub use session::{ClientSnapshot, SessionState, VoiceController, VoiceMember};
pub use transcript::{Speaker, TranscriptLog};
