//! Remote streaming-session contract
//!
//! The conversational-audio service is a black box behind these types: a
//! [`LiveConnector`] opens a session from a [`LiveConfig`] and delivers
//! [`SessionEvent`]s in arrival order; an open [`LiveSession`] accepts
//! encoded microphone frames on its send path. The wire shapes mirror the
//! service's JSON contract so a concrete connector deserializes inbound
//! payloads directly.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::Result;
use crate::audio::codec::EncodedFrame;
use crate::config::ClientConfig;

/// Response modality requested from the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    /// Synthesized speech responses
    Audio,
}

/// Configuration for opening a remote session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveConfig {
    /// Modality of the service's responses; always audio for this client
    pub response_modality: Modality,
    /// Voice identifier for synthesis
    pub voice_name: String,
    /// System instruction applied to the whole session
    pub system_instruction: String,
    /// Report partial transcripts of the user's speech
    pub input_audio_transcription: bool,
    /// Report partial transcripts of the synthesized speech
    pub output_audio_transcription: bool,
}

impl LiveConfig {
    /// Build the session configuration from the client configuration.
    ///
    /// Transcript reporting is enabled in both directions; the transcript
    /// log is fed from these partials.
    #[must_use]
    pub fn from_client(config: &ClientConfig) -> Self {
        Self {
            response_modality: Modality::Audio,
            voice_name: config.voice_name.clone(),
            system_instruction: config.system_instruction.clone(),
            input_audio_transcription: true,
            output_audio_transcription: true,
        }
    }
}

/// Inline synthesized-audio chunk carried by a server message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineAudio {
    /// PCM mime type including the output rate
    pub mime_type: String,
    /// Base64-wrapped little-endian 16-bit PCM
    pub data: String,
}

/// One inbound message from the session
///
/// Any subset of fields may be present simultaneously. An interruption takes
/// precedence over an audio chunk carried in the same message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerMessage {
    /// Inline synthesized-audio chunk, if any
    pub audio: Option<InlineAudio>,
    /// The service detected new input and stopped speaking mid-utterance
    pub interrupted: bool,
    /// Partial transcript of the user's speech
    pub input_transcription: Option<String>,
    /// Partial transcript of the synthesized speech
    pub output_transcription: Option<String>,
}

impl ServerMessage {
    /// Deserialize a raw JSON payload from the wire.
    ///
    /// # Errors
    ///
    /// Returns error if the payload is not valid JSON for this shape
    pub fn from_json(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

/// Handle to an open bidirectional session
///
/// Implementations buffer internally: neither call may block the caller,
/// which on the send path is the audio device thread.
pub trait LiveSession: Send + Sync {
    /// Hand one encoded microphone frame to the send path
    fn send_realtime_input(&self, frame: EncodedFrame);

    /// Close the session; tolerates already-closed
    fn close(&self);
}

/// Events delivered by a session, in arrival order
///
/// The named-event reframing of the underlying platform's open/message/
/// error/close callbacks; how the platform schedules them (event loop,
/// thread pool, actor mailbox) is invisible here.
pub enum SessionEvent {
    /// Handshake completed; the handle accepts realtime input from now on
    Opened(Arc<dyn LiveSession>),
    /// One inbound server message
    Message(ServerMessage),
    /// The session failed; terminal for this connection
    Error(String),
    /// The session closed
    Closed,
}

impl fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opened(_) => f.write_str("Opened"),
            Self::Message(message) => f.debug_tuple("Message").field(message).finish(),
            Self::Error(reason) => f.debug_tuple("Error").field(reason).finish(),
            Self::Closed => f.write_str("Closed"),
        }
    }
}

/// Stream of session events, in arrival order
pub type SessionEvents = UnboundedReceiver<SessionEvent>;

/// Opens remote sessions
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Begin the handshake.
    ///
    /// On success, events are delivered on the returned channel starting
    /// with [`SessionEvent::Opened`].
    ///
    /// # Errors
    ///
    /// Returns error if the handshake cannot be initiated
    async fn connect(&self, config: LiveConfig) -> Result<SessionEvents>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_parses_any_subset() {
        let message = ServerMessage::from_json(
            br#"{"audio":{"mimeType":"audio/pcm;rate=24000","data":"AAA="},"interrupted":true}"#,
        )
        .unwrap();

        assert!(message.interrupted);
        assert_eq!(
            message.audio.as_ref().unwrap().mime_type,
            "audio/pcm;rate=24000"
        );
        assert!(message.input_transcription.is_none());

        let empty = ServerMessage::from_json(b"{}").unwrap();
        assert!(!empty.interrupted);
        assert!(empty.audio.is_none());
    }

    #[test]
    fn transcripts_use_camel_case_keys() {
        let message = ServerMessage::from_json(
            br#"{"inputTranscription":"hello","outputTranscription":"hi there"}"#,
        )
        .unwrap();

        assert_eq!(message.input_transcription.as_deref(), Some("hello"));
        assert_eq!(message.output_transcription.as_deref(), Some("hi there"));
    }

    #[test]
    fn live_config_carries_client_settings() {
        let client = ClientConfig::default();
        let config = LiveConfig::from_client(&client);

        assert_eq!(config.response_modality, Modality::Audio);
        assert_eq!(config.voice_name, client.voice_name);
        assert!(config.input_audio_transcription);
        assert!(config.output_audio_transcription);
    }

    #[test]
    fn modality_serializes_uppercase() {
        let raw = serde_json::to_string(&Modality::Audio).unwrap();
        assert_eq!(raw, "\"AUDIO\"");
    }
}
