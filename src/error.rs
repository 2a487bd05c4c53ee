//! Error types for the chorus client core

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice client core
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Microphone or audio device acquisition failure
    #[error("acquisition error: {0}")]
    Acquisition(String),

    /// Remote session open/send/receive failure
    #[error("session error: {0}")]
    Session(String),

    /// Inbound audio payload is not valid base64
    #[error("decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    /// Inbound byte length is not a whole number of 16-bit PCM samples
    #[error("unsupported audio format: {len} bytes is not 16-bit PCM")]
    UnsupportedFormat {
        /// Length of the offending payload
        len: usize,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
