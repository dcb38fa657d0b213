//! Tolerance constants for audio testing.
//!
//! Different operations require different precision levels.

/// Floating point rounding errors (passthrough, unity gain, plain sums).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// DSP processing tolerance (smoothed gains, interpolation, filters).
pub const DSP_EPSILON: f32 = 1e-4;

/// Audio perceptual tolerance (~-60dB, inaudible differences).
pub const PERCEPTUAL_EPSILON: f32 = 0.001;

/// Silence threshold (~-80dB).
/// Values below this are considered silent.
pub const SILENCE_THRESHOLD: f32 = 0.0001;

/// 16-bit quantization step size.
/// Use when comparing against 16-bit PCM sample files.
pub const INT16_EPSILON: f32 = 1.0 / 32768.0;
