//! Audio pipeline
//!
//! Microphone capture, the PCM wire codec, and scheduled playback. Sample
//! rates, the frame size, and the voice-activity threshold are protocol
//! constants dictated by the remote service.

pub mod capture;
pub mod codec;
pub mod playback;

pub use capture::{
    CAPTURE_SAMPLE_RATE, CapturePipeline, FRAME_SAMPLES, FrameChunker, FrameHandler,
    VAD_RMS_THRESHOLD, rms,
};
pub use codec::{EncodedFrame, PCM_MIME_TYPE, PlaybackChunk, decode, decode_to_chunk, encode_frame};
pub use playback::{PLAYBACK_SAMPLE_RATE, PlaybackScheduler};
