//! Audio pipeline integration tests
//!
//! Exercises the codec, the frame chunker, and the playback scheduler
//! without requiring audio hardware.

use chorus_client::audio::{
    CAPTURE_SAMPLE_RATE, FRAME_SAMPLES, FrameChunker, PLAYBACK_SAMPLE_RATE, PlaybackChunk,
    PlaybackScheduler, VAD_RMS_THRESHOLD, decode, decode_to_chunk, encode_frame, rms,
};

mod common;

fn chunk_of(duration: f64) -> PlaybackChunk {
    let frames = (duration * f64::from(PLAYBACK_SAMPLE_RATE)).round() as usize;
    PlaybackChunk {
        samples: vec![0.1; frames],
        sample_rate: PLAYBACK_SAMPLE_RATE,
        channels: 1,
        duration,
    }
}

#[test]
fn codec_round_trips_a_full_capture_frame() {
    common::init_tracing();
    let samples = common::sine_samples(CAPTURE_SAMPLE_RATE, 440.0, 0.256, 0.8);
    assert_eq!(samples.len(), FRAME_SAMPLES);

    let encoded = encode_frame(&samples);
    assert_eq!(encoded.mime_type, "audio/pcm;rate=16000");

    let bytes = decode(&encoded.data).unwrap();
    assert_eq!(bytes.len(), FRAME_SAMPLES * 2);

    let chunk = decode_to_chunk(&bytes, CAPTURE_SAMPLE_RATE, 1).unwrap();
    assert_eq!(chunk.samples.len(), samples.len());
    for (original, reconstructed) in samples.iter().zip(&chunk.samples) {
        assert!((original - reconstructed).abs() <= 1.0 / 32768.0);
    }
    assert!((chunk.duration - 0.256).abs() < 1e-9);
}

#[test]
fn vad_threshold_separates_speech_from_silence() {
    // A frame with RMS energy 0.02 counts as speech
    let speech = vec![0.02f32; FRAME_SAMPLES];
    assert!(rms(&speech) > VAD_RMS_THRESHOLD);

    // An all-zero frame does not
    let quiet = common::silence(CAPTURE_SAMPLE_RATE, 0.256);
    assert!(rms(&quiet) <= VAD_RMS_THRESHOLD);
}

#[test]
fn chunker_reframes_device_buffers_to_fixed_frames() {
    let mut chunker = FrameChunker::new(FRAME_SAMPLES);
    let mut flags = Vec::new();

    // Device buffers rarely align with the frame size; feed 1k at a time
    let speech = common::sine_samples(CAPTURE_SAMPLE_RATE, 440.0, 0.5, 0.3);
    for buffer in speech.chunks(1000) {
        chunker.push(buffer, |frame| {
            assert_eq!(frame.len(), FRAME_SAMPLES);
            flags.push(rms(frame) > VAD_RMS_THRESHOLD);
        });
    }

    assert_eq!(flags.len(), 8000 / FRAME_SAMPLES);
    assert!(flags.iter().all(|&speaking| speaking));
}

#[test]
fn idle_clock_schedules_at_cumulative_durations() {
    let scheduler = PlaybackScheduler::detached();
    let durations = [0.5, 0.3, 0.2, 0.4];

    let starts: Vec<f64> = durations.iter().map(|&d| scheduler.enqueue(chunk_of(d))).collect();

    let mut expected = 0.0;
    for (start, duration) in starts.iter().zip(&durations) {
        assert!((start - expected).abs() < 1e-9);
        expected += duration;
    }
}

#[test]
fn scheduled_chunks_never_overlap() {
    let scheduler = PlaybackScheduler::detached();
    let mut previous_end = 0.0;

    for &duration in &[0.5, 0.1, 0.7, 0.05, 0.3] {
        let start = scheduler.enqueue(chunk_of(duration));
        assert!(start + 1e-9 >= previous_end);
        previous_end = start + duration;
        // Clock drifts forward between arrivals
        scheduler.advance(0.08);
    }
}

#[test]
fn happy_path_second_chunk_starts_after_the_first() {
    let scheduler = PlaybackScheduler::detached();

    let first = scheduler.enqueue(chunk_of(0.5));
    assert!(first.abs() < 1e-9);

    // Second chunk arrives 0.1 s later, while the first is still playing
    scheduler.advance(0.1);
    let second = scheduler.enqueue(chunk_of(0.3));

    // It is scheduled at first.start + 0.5, not at now + 0.1
    assert!((second - 0.5).abs() < 1e-9);
}

#[test]
fn interrupt_mid_playback_flushes_and_reanchors() {
    let scheduler = PlaybackScheduler::detached();

    scheduler.enqueue(chunk_of(0.5));
    scheduler.enqueue(chunk_of(0.3));
    scheduler.advance(0.2);
    assert!(scheduler.is_speaking());

    scheduler.interrupt();
    assert!(!scheduler.is_speaking());
    assert_eq!(scheduler.active_len(), 0);

    // The next chunk starts at the live clock, not the pre-interrupt cursor
    let start = scheduler.enqueue(chunk_of(0.2));
    assert!((start - 0.2).abs() < 1e-9);
}

#[test]
fn long_pause_does_not_accumulate_drift() {
    let scheduler = PlaybackScheduler::detached();

    scheduler.enqueue(chunk_of(0.25));
    scheduler.advance(5.0);

    // The cursor is stale; the chunk must start now, not at 0.25
    let start = scheduler.enqueue(chunk_of(0.25));
    assert!((start - 5.0).abs() < 1e-9);
    assert!((scheduler.cursor() - 5.25).abs() < 1e-9);
}

#[test]
fn wire_chunk_feeds_the_scheduler() {
    // Full inbound path: base64 payload -> bytes -> chunk -> schedule
    let samples = common::sine_samples(PLAYBACK_SAMPLE_RATE, 220.0, 0.5, 0.4);
    let payload = encode_frame(&samples).data;

    let bytes = decode(&payload).unwrap();
    let chunk = decode_to_chunk(&bytes, PLAYBACK_SAMPLE_RATE, 1).unwrap();
    assert!((chunk.duration - 0.5).abs() < 1e-6);

    let scheduler = PlaybackScheduler::detached();
    let start = scheduler.enqueue(chunk);
    assert!(start.abs() < 1e-9);
    assert!(scheduler.is_speaking());

    scheduler.advance(0.51);
    assert!(!scheduler.is_speaking());
}
