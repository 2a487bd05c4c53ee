//! Scheduled audio playback
//!
//! Decoded chunks are scheduled back-to-back against the output clock so
//! playback is gapless and non-overlapping, and everything in flight can be
//! flushed immediately when the remote voice is interrupted.
//!
//! The output clock is the number of frames the render engine has produced,
//! in seconds. Scheduling never places a chunk before the clock: if the clock
//! has overtaken the cursor (a long pause between chunks), the next chunk
//! re-anchors at the live clock instead of the stale cursor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::audio::codec::PlaybackChunk;
use crate::{Error, Result};

/// Sample rate for playback (24 kHz, fixed by the service's synthesis output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// One chunk scheduled against the output clock
struct ScheduledSource {
    samples: Vec<f32>,
    /// Start position in output frames since the engine began
    start_frame: u64,
}

impl ScheduledSource {
    #[allow(clippy::cast_possible_truncation)]
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

/// State shared between the scheduler API and the render callback
struct Shared {
    state: Mutex<SchedulerState>,
    /// Output frames rendered so far; the clock reads this
    frames_rendered: AtomicU64,
    /// True while the active set is non-empty
    speaking: AtomicBool,
}

struct SchedulerState {
    /// Earliest time the next chunk may start, in clock seconds
    cursor: f64,
    next_id: u64,
    sources: HashMap<u64, ScheduledSource>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                cursor: 0.0,
                next_id: 0,
                sources: HashMap::new(),
            }),
            frames_rendered: AtomicU64::new(0),
            speaking: AtomicBool::new(false),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn now(&self) -> f64 {
        self.frames_rendered.load(Ordering::SeqCst) as f64 / f64::from(PLAYBACK_SAMPLE_RATE)
    }

    /// Drop every source the clock has fully passed; lower the speaking flag
    /// once the set empties.
    fn retire_finished(&self) {
        let now_frame = self.frames_rendered.load(Ordering::SeqCst);
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let before = state.sources.len();
        state.sources.retain(|_, source| source.end_frame() > now_frame);
        if before > 0 && state.sources.is_empty() {
            self.speaking.store(false, Ordering::SeqCst);
            tracing::trace!("playback drained");
        }
    }

    /// Render one output buffer: copy every active source's overlap with the
    /// current window, duplicated across channels, then advance the clock.
    #[allow(clippy::cast_possible_truncation)]
    fn render(&self, data: &mut [f32], channels: usize) {
        data.fill(0.0);
        let window_start = self.frames_rendered.load(Ordering::SeqCst);
        let window_frames = (data.len() / channels) as u64;

        if let Ok(state) = self.state.lock() {
            for source in state.sources.values() {
                let overlap_start = source.start_frame.max(window_start);
                let overlap_end = source.end_frame().min(window_start + window_frames);
                if overlap_start >= overlap_end {
                    continue;
                }
                for frame in overlap_start..overlap_end {
                    let sample = source.samples[(frame - source.start_frame) as usize];
                    let offset = (frame - window_start) as usize * channels;
                    for out in &mut data[offset..offset + channels] {
                        *out += sample;
                    }
                }
            }
        }

        self.frames_rendered.fetch_add(window_frames, Ordering::SeqCst);
        self.retire_finished();
    }
}

/// Schedules decoded chunks for contiguous playback on the output device
///
/// Owns the playback cursor and the set of in-flight scheduled sources. A
/// detached scheduler (no device) exposes the same behavior against a
/// manually advanced clock, for tests and hosts without audio hardware.
pub struct PlaybackScheduler {
    shared: Arc<Shared>,
    stream: Option<Stream>,
}

impl PlaybackScheduler {
    /// Claim the default output device at the playback rate and start the
    /// render engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Acquisition`] if no output device is available or
    /// none supports 24 kHz
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Acquisition("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Acquisition(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::Acquisition("no suitable output config found".to_string()))?;

        let config: StreamConfig = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();
        let channels = usize::from(config.channels);

        let shared = Arc::new(Shared::new());
        let render_shared = Arc::clone(&shared);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    render_shared.render(data, channels);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Acquisition(e.to_string()))?;

        stream
            .play()
            .map_err(|e| Error::Acquisition(e.to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "playback engine started"
        );

        Ok(Self {
            shared,
            stream: Some(stream),
        })
    }

    /// Construct a scheduler with no output device.
    ///
    /// The clock only moves through [`advance`](Self::advance); everything
    /// else behaves identically. For tests and headless hosts.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            stream: None,
        }
    }

    /// Current output-clock time in seconds
    #[must_use]
    pub fn now(&self) -> f64 {
        self.shared.now()
    }

    /// Schedule a chunk to start at `max(cursor, now)` and advance the
    /// cursor past it. Returns the scheduled start time.
    ///
    /// Chunks enqueued in arrival order never overlap: each start time is at
    /// least the previous start plus the previous duration.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn enqueue(&self, chunk: PlaybackChunk) -> f64 {
        let now = self.shared.now();
        let samples = mono_samples(&chunk);

        let Ok(mut state) = self.shared.state.lock() else {
            return now;
        };
        let start = if state.cursor > now { state.cursor } else { now };
        let start_frame = (start * f64::from(PLAYBACK_SAMPLE_RATE)).round() as u64;
        state.cursor = start + chunk.duration;

        let id = state.next_id;
        state.next_id += 1;
        state.sources.insert(
            id,
            ScheduledSource {
                samples,
                start_frame,
            },
        );
        drop(state);

        self.shared.speaking.store(true, Ordering::SeqCst);
        tracing::trace!(start, duration = chunk.duration, "chunk scheduled");
        start
    }

    /// Stop and discard every scheduled source immediately.
    ///
    /// The cursor resets so the next enqueue re-anchors at the live clock.
    /// Safe to call with nothing scheduled.
    pub fn interrupt(&self) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.sources.clear();
            state.cursor = 0.0;
        }
        self.shared.speaking.store(false, Ordering::SeqCst);
        tracing::debug!("playback interrupted, scheduled audio flushed");
    }

    /// Flush all scheduled audio and release the output device
    pub fn shutdown(&mut self) {
        self.interrupt();
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("playback engine stopped");
        }
    }

    /// Advance the clock of a detached scheduler, retiring finished sources.
    ///
    /// No-op semantics match the render engine: the clock only moves forward.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn advance(&self, seconds: f64) {
        let frames = (seconds.max(0.0) * f64::from(PLAYBACK_SAMPLE_RATE)).round() as u64;
        self.shared.frames_rendered.fetch_add(frames, Ordering::SeqCst);
        self.shared.retire_finished();
    }

    /// True while any scheduled source is still pending or playing
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.shared.speaking.load(Ordering::SeqCst)
    }

    /// Number of sources in the active scheduled set
    #[must_use]
    pub fn active_len(&self) -> usize {
        self.shared
            .state
            .lock()
            .map(|state| state.sources.len())
            .unwrap_or_default()
    }

    /// Earliest time the next chunk may start, in clock seconds
    #[must_use]
    pub fn cursor(&self) -> f64 {
        self.shared
            .state
            .lock()
            .map(|state| state.cursor)
            .unwrap_or_default()
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Collapse an interleaved chunk to the scheduler's mono timeline
#[allow(clippy::cast_precision_loss)]
fn mono_samples(chunk: &PlaybackChunk) -> Vec<f32> {
    if chunk.channels <= 1 {
        return chunk.samples.clone();
    }

    let channels = usize::from(chunk.channels);
    chunk
        .samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
