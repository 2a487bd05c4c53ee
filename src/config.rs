//! Client configuration
//!
//! Session behavior a front end may tune: the requested voice, the system
//! instruction, the transcript budget, and the handshake timeout. Wire
//! protocol constants (sample rates, frame size, the voice-activity
//! threshold) are dictated by the remote service and live as `const`s in the
//! audio modules instead.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::Result;

/// Default voice identifier requested from the service
const DEFAULT_VOICE: &str = "Puck";

/// Default system instruction sent when the session opens
const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful and funny voice assistant named \
     'Chorus'. You are hanging out in a voice channel. Keep your responses concise and friendly.";

/// Default rolling transcript budget in characters
const DEFAULT_TRANSCRIPT_CAP: usize = 500;

/// Default bound on the session handshake
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Voice client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Voice identifier requested from the service
    pub voice_name: String,

    /// System instruction sent when the session opens
    pub system_instruction: String,

    /// Rolling transcript budget in characters
    pub transcript_cap: usize,

    /// Seconds to wait for the session handshake before failing the connect
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            voice_name: DEFAULT_VOICE.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            transcript_cap: DEFAULT_TRANSCRIPT_CAP,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Parse a configuration from TOML text; absent fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the TOML is malformed or has unknown fields
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Load a configuration file from disk.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Handshake timeout as a [`Duration`]
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_conventions() {
        let config = ClientConfig::default();
        assert_eq!(config.voice_name, "Puck");
        assert_eq!(config.transcript_cap, 500);
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert!(config.system_instruction.contains("voice channel"));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = ClientConfig::from_toml_str("voice_name = \"Kore\"").unwrap();
        assert_eq!(config.voice_name, "Kore");
        assert_eq!(config.transcript_cap, 500);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(ClientConfig::from_toml_str("volume = 11").is_err());
    }
}
