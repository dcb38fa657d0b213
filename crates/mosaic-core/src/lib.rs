//! Core runtime pieces shared by the Mosaic sampler engine.
//!
//! # Primary API
//!
//! - [`EngineConfig`]: runtime configuration with validation
//! - [`constants`]: compile-time layout of the engine (block size, pool sizes, bus counts)
//! - [`AtomicFloat`] / [`AtomicFlag`]: cache-aligned atomics for cross-thread status
//! - [`SmoothedValue`]: zipper-free parameter ramps
//! - [`SampleRateContext`]: sample-rate/block-rate pair, with oversampled derivations
//! - [`SampleManager`] / [`Sample`] / [`SampleId`]: shared PCM store
//!
//! # Feature-gated APIs
//!
//! - `"wav"`: [`WavLoader`] decoding through `hound` (enabled by default)
//! - `"instrument"`: [`instrument`] live instance counters

pub mod constants;
pub use constants::*;

pub mod error;
pub use error::{Error, Result};

mod config;
pub use config::EngineConfig;

pub mod gain;

pub mod instrument;

pub mod lockfree;
pub use lockfree::{AtomicFlag, AtomicFloat};

mod rate;
pub use rate::SampleRateContext;

pub mod sample;
pub use sample::{Sample, SampleId, SampleLoader, SampleManager};
#[cfg(feature = "wav")]
pub use sample::WavLoader;

mod smooth;
pub use smooth::SmoothedValue;

/// One block of mono audio.
pub type MonoBlock = [f32; BLOCK_SIZE];

/// One block of stereo audio, `[channel][sample]`.
pub type StereoBlock = [[f32; BLOCK_SIZE]; 2];

/// Silent stereo block.
pub const SILENT_BLOCK: StereoBlock = [[0.0; BLOCK_SIZE]; 2];
