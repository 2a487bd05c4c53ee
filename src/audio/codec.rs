//! PCM wire codec
//!
//! Pure conversions between floating-point samples and the service's
//! base64-wrapped little-endian 16-bit PCM convention. Encoding is total:
//! out-of-range samples are clamped, never rejected.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;

use crate::{Error, Result};

/// Mime type attached to every outbound frame
pub const PCM_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// Wire representation of one encoded microphone frame
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedFrame {
    /// Fixed PCM mime type, including the capture rate
    pub mime_type: &'static str,
    /// Base64-wrapped little-endian 16-bit PCM
    pub data: String,
}

/// A decoded buffer of playback samples plus its computed duration
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackChunk {
    /// Interleaved samples in [-1, 1]
    pub samples: Vec<f32>,
    /// Output rate the samples were synthesized at
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Playback length in seconds
    pub duration: f64,
}

/// Quantize, serialize, and base64-wrap one captured frame
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn encode_frame(samples: &[f32]) -> EncodedFrame {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let quantized = (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16;
        bytes.extend_from_slice(&quantized.to_le_bytes());
    }

    EncodedFrame {
        mime_type: PCM_MIME_TYPE,
        data: BASE64.encode(bytes),
    }
}

/// Decode a base64 audio payload to raw PCM bytes.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the payload is not valid base64
pub fn decode(data: &str) -> Result<Vec<u8>> {
    Ok(BASE64.decode(data)?)
}

/// Interpret raw bytes as little-endian 16-bit PCM at the given rate.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] if the byte length is not a whole
/// number of samples
#[allow(clippy::cast_precision_loss)]
pub fn decode_to_chunk(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<PlaybackChunk> {
    if bytes.len() % 2 != 0 {
        return Err(Error::UnsupportedFormat { len: bytes.len() });
    }

    let samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect();

    let frames = samples.len() / usize::from(channels.max(1));
    let duration = frames as f64 / f64::from(sample_rate);

    Ok(PlaybackChunk {
        samples,
        sample_rate,
        channels,
        duration,
    })
}
