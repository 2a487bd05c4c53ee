//! Microphone capture pipeline
//!
//! Claims the default input device at the service's fixed capture rate and
//! delivers exact fixed-size frames with a voice-activity flag. Frame
//! assembly and the RMS computation run on the device thread; the frame
//! callback must never block it.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Sample rate for audio capture (16 kHz, fixed by the service)
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Samples per processing frame
pub const FRAME_SAMPLES: usize = 4096;

/// RMS energy above which a frame counts as speech
pub const VAD_RMS_THRESHOLD: f32 = 0.01;

/// Per-frame callback: the raw frame and whether it crossed the VAD threshold
pub type FrameHandler = Arc<dyn Fn(&[f32], bool) + Send + Sync>;

/// Root-mean-square energy of a buffer of samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Accumulates device buffers of arbitrary size into exact fixed-size frames
#[derive(Debug)]
pub struct FrameChunker {
    pending: Vec<f32>,
    frame_len: usize,
}

impl FrameChunker {
    /// Create a chunker emitting frames of `frame_len` samples
    #[must_use]
    pub fn new(frame_len: usize) -> Self {
        Self {
            pending: Vec::with_capacity(frame_len * 2),
            frame_len,
        }
    }

    /// Feed captured samples, invoking `emit` once per completed frame
    pub fn push(&mut self, samples: &[f32], mut emit: impl FnMut(&[f32])) {
        self.pending.extend_from_slice(samples);
        while self.pending.len() >= self.frame_len {
            emit(&self.pending[..self.frame_len]);
            self.pending.drain(..self.frame_len);
        }
    }

    /// Samples buffered toward the next frame
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Owns the microphone stream and the per-frame processing callback
pub struct CapturePipeline {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
}

impl CapturePipeline {
    /// Claim the default input device at the capture rate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Acquisition`] if no input device is available or none
    /// supports mono capture at 16 kHz
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Acquisition("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Acquisition(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(CAPTURE_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(CAPTURE_SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Acquisition("no suitable capture config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(CAPTURE_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = CAPTURE_SAMPLE_RATE,
            "capture pipeline initialized"
        );

        Ok(Self {
            device,
            config,
            stream: None,
        })
    }

    /// Attach the processing callback and start consuming the microphone.
    ///
    /// Each completed frame is handed to `on_frame` together with its VAD
    /// flag. Calling while already started is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Acquisition`] if the input stream cannot be built or
    /// started
    pub fn start(&mut self, on_frame: FrameHandler) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let chunker = Mutex::new(FrameChunker::new(FRAME_SAMPLES));

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let Ok(mut chunker) = chunker.lock() else {
                        return;
                    };
                    chunker.push(data, |frame| {
                        let energy = rms(frame);
                        on_frame(frame, energy > VAD_RMS_THRESHOLD);
                    });
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Acquisition(e.to_string()))?;

        stream
            .play()
            .map_err(|e| Error::Acquisition(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("capture pipeline started");
        Ok(())
    }

    /// Detach the callback and release the stream; calling twice is a no-op
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("capture pipeline stopped");
        }
    }

    /// Check if the microphone is currently being consumed
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_silence_is_zero() {
        assert!(rms(&vec![0.0; FRAME_SAMPLES]) < f32::EPSILON);
        assert!(rms(&[]) < f32::EPSILON);
    }

    #[test]
    fn rms_tracks_amplitude() {
        let frame = vec![0.02f32; FRAME_SAMPLES];
        let energy = rms(&frame);
        assert!((energy - 0.02).abs() < 1e-6);
        assert!(energy > VAD_RMS_THRESHOLD);
    }

    #[test]
    fn quiet_chatter_stays_below_threshold() {
        let frame = vec![0.005f32; FRAME_SAMPLES];
        assert!(rms(&frame) <= VAD_RMS_THRESHOLD);
    }

    #[test]
    fn chunker_emits_exact_frames() {
        let mut chunker = FrameChunker::new(4);
        let mut frames: Vec<Vec<f32>> = Vec::new();

        chunker.push(&[1.0, 2.0, 3.0], |f| frames.push(f.to_vec()));
        assert!(frames.is_empty());
        assert_eq!(chunker.pending_len(), 3);

        chunker.push(&[4.0, 5.0], |f| frames.push(f.to_vec()));
        assert_eq!(frames, vec![vec![1.0, 2.0, 3.0, 4.0]]);
        assert_eq!(chunker.pending_len(), 1);
    }

    #[test]
    fn chunker_handles_oversized_buffers() {
        let mut chunker = FrameChunker::new(2);
        let mut count = 0;

        chunker.push(&[0.0; 7], |f| {
            assert_eq!(f.len(), 2);
            count += 1;
        });
        assert_eq!(count, 3);
        assert_eq!(chunker.pending_len(), 1);
    }
}
