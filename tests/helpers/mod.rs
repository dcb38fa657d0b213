//! Test helpers and fixtures for Mosaic integration tests
//!
//! Engines here never touch audio hardware: every test drives
//! `process_audio` by hand, one block at a time.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (passthrough, unity gain)
//! - `DSP_EPSILON` (1e-4): DSP processing (smoothing, interpolation)
//! - `PERCEPTUAL_EPSILON` (0.001): Perceptual equivalence (-60dB)
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)

#![allow(dead_code)]

pub mod tolerances;

use crossbeam_channel::Receiver;
use mosaic::prelude::*;
use mosaic::BLOCK_SIZE;
use std::path::Path;
use std::time::Duration;

/// Default test sample rate (matches common hardware)
pub const TEST_SAMPLE_RATE: f64 = 48000.0;

/// How long a test waits for a reply from the serialization thread.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Create a basic test engine with minimal configuration.
pub fn test_engine() -> Engine {
    test_engine_with_voices(16)
}

pub fn test_engine_with_voices(max_voices: usize) -> Engine {
    Engine::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .max_voices(max_voices)
        .build()
        .expect("Failed to create test engine")
}

/// Store a constant-valued mono sample, one second long.
pub fn dc_sample(engine: &Engine, level: f32) -> SampleId {
    engine
        .samples()
        .insert(Sample::mono(TEST_SAMPLE_RATE, vec![level; TEST_SAMPLE_RATE as usize]))
}

/// Store an integer staircase sample `[0, 1, 2, ...]`, scaled by `scale`.
pub fn staircase_sample(engine: &Engine, frames: usize, scale: f32) -> SampleId {
    let data = generate_integer_staircase(frames)
        .into_iter()
        .map(|s| s * scale)
        .collect();
    engine.samples().insert(Sample::mono(TEST_SAMPLE_RATE, data))
}

/// Zone data whose envelopes open and close within one block, so levels
/// are exact from the first block on.
pub fn instant_data() -> ZoneData {
    ZoneData {
        envelopes: [EnvelopeStorage::instant(1.0); 2],
        ..ZoneData::default()
    }
}

pub fn instant_zone(sample: SampleId) -> ZoneSpec {
    ZoneSpec {
        data: instant_data(),
        sample: SampleRef::Id(sample),
    }
}

/// Render `blocks` blocks of one output, returned as `(left, right)`.
pub fn render_blocks(engine: &mut Engine, output: usize, blocks: usize) -> (Vec<f32>, Vec<f32>) {
    let mut left = Vec::with_capacity(blocks * BLOCK_SIZE);
    let mut right = Vec::with_capacity(blocks * BLOCK_SIZE);
    for _ in 0..blocks {
        let out = &engine.process_audio()[output];
        left.extend_from_slice(&out[0]);
        right.extend_from_slice(&out[1]);
    }
    (left, right)
}

/// Last left-channel sample of a freshly rendered block on `output`.
pub fn settled_level(engine: &mut Engine, output: usize) -> f32 {
    engine.process_audio()[output][0][BLOCK_SIZE - 1]
}

/// Route decoded replies into a channel.
pub fn reply_channel(engine: &Engine) -> Receiver<SerializationToClient> {
    let (tx, rx) = crossbeam_channel::unbounded();
    engine.client().set_reply_callback(move |bytes| {
        if let Ok(reply) = SerializationToClient::decode(bytes) {
            let _ = tx.send(reply);
        }
    });
    rx
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect()
}

/// Generate an integer staircase signal [0, 1, 2, ..., n-1] as f32.
///
/// Each sample equals its index, which makes playback position visible in
/// the output.
pub fn generate_integer_staircase(num_samples: usize) -> Vec<f32> {
    (0..num_samples).map(|i| i as f32).collect()
}

/// Calculate RMS of a signal.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Assert signal is silent within threshold.
pub fn assert_is_silent(samples: &[f32], threshold: f32, context: &str) {
    let max_val = peak(samples);
    assert!(
        max_val <= threshold,
        "{}: Expected silence (threshold {}), but peak was {}",
        context,
        threshold,
        max_val
    );
}

/// Assert signal is NOT silent (has content above threshold).
pub fn assert_not_silent(samples: &[f32], min_peak: f32, context: &str) {
    let max_val = peak(samples);
    assert!(
        max_val >= min_peak,
        "{}: Expected audio (min_peak {}), but peak was only {}",
        context,
        min_peak,
        max_val
    );
}

/// Write a mono 16-bit PCM WAV file.
pub fn save_wav_file_pcm16(path: &Path, samples: &[f32], sample_rate: u32) -> std::result::Result<(), String> {
    use hound::{WavSpec, WavWriter};

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        WavWriter::create(path, spec).map_err(|e| format!("Failed to create WAV: {}", e))?;
    for s in samples {
        let value = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
        writer
            .write_sample(value)
            .map_err(|e| format!("Write error: {}", e))?;
    }
    writer
        .finalize()
        .map_err(|e| format!("Finalize error: {}", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_sine() {
        let samples = generate_sine(440.0, 44100.0, 44100);
        assert_eq!(samples.len(), 44100);
        assert!(rms(&samples) > 0.5);
        assert!(peak(&samples) <= 1.0);
    }

    #[test]
    fn test_rms_calculation() {
        // Full-scale sine wave has RMS of ~0.707
        let samples = generate_sine(440.0, 44100.0, 44100);
        assert!((rms(&samples) - 0.707).abs() < 0.01);
    }
}
