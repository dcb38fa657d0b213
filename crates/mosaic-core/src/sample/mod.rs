//! Sample store: decoded PCM buffers shared by zones and voices.
//!
//! Samples are immutable once decoded and handed around as `Arc<Sample>`.
//! The [`SampleManager`] keeps one reference to every loaded sample, so the
//! last reference never goes away on the audio thread.

mod loader;
mod manager;

#[cfg(feature = "wav")]
pub use loader::WavLoader;
pub use loader::SampleLoader;
pub use manager::SampleManager;

use crate::instrument::Tracked;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Identifier of a sample in the [`SampleManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleId(pub u64);

impl SampleId {
    /// Generate a new unique sample ID.
    pub fn generate() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SampleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sample#{}", self.0)
    }
}

/// Decoded, de-interleaved PCM data. Mono or stereo.
#[derive(Debug)]
pub struct Sample {
    id: SampleId,
    path: Option<PathBuf>,
    sample_rate: f64,
    channels: Vec<Vec<f32>>,
    _tracked: Tracked,
}

impl Sample {
    /// Build from de-interleaved channel data. Extra channels past two are
    /// dropped; channels are truncated to the shortest one.
    pub fn from_channels(sample_rate: f64, mut channels: Vec<Vec<f32>>) -> Self {
        channels.truncate(2);
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for channel in &mut channels {
            channel.truncate(frames);
        }
        Self {
            id: SampleId::generate(),
            path: None,
            sample_rate,
            channels,
            _tracked: Tracked::new("Sample"),
        }
    }

    pub fn mono(sample_rate: f64, data: Vec<f32>) -> Self {
        Self::from_channels(sample_rate, vec![data])
    }

    pub fn stereo(sample_rate: f64, left: Vec<f32>, right: Vec<f32>) -> Self {
        Self::from_channels(sample_rate, vec![left, right])
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[inline]
    pub fn id(&self) -> SampleId {
        self.id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn is_stereo(&self) -> bool {
        self.channels.len() == 2
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Sample value at `frame` in `channel`; mono data answers for both channels,
    /// out-of-range frames read as silence.
    #[inline]
    pub fn at(&self, channel: usize, frame: usize) -> f32 {
        let channel = channel.min(self.channels.len().saturating_sub(1));
        self.channels
            .get(channel)
            .and_then(|data| data.get(frame))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn channel(&self, channel: usize) -> &[f32] {
        self.channels.get(channel).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate
    }
}
