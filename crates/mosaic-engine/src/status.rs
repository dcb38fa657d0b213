//! Engine status published by the audio thread.

use mosaic_core::AtomicFloat;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters the audio thread stores once per block and the serialization
/// thread reads when answering status requests.
#[derive(Debug, Default)]
pub struct EngineStatus {
    active_voices: AtomicUsize,
    blocks_processed: AtomicU64,
    tail_samples: AtomicUsize,
    peak: AtomicFloat,
}

/// Plain copy of [`EngineStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatusSnapshot {
    pub active_voices: usize,
    pub blocks_processed: u64,
    pub tail_samples: usize,
    pub peak: f32,
}

impl EngineStatus {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn publish(&self, active_voices: usize, tail_samples: usize, peak: f32) {
        self.active_voices.store(active_voices, Ordering::Relaxed);
        self.tail_samples.store(tail_samples, Ordering::Relaxed);
        self.peak.set(peak);
        self.blocks_processed.fetch_add(1, Ordering::Release);
    }

    pub fn active_voices(&self) -> usize {
        self.active_voices.load(Ordering::Relaxed)
    }

    pub fn blocks_processed(&self) -> u64 {
        self.blocks_processed.load(Ordering::Acquire)
    }

    pub fn tail_samples(&self) -> usize {
        self.tail_samples.load(Ordering::Relaxed)
    }

    /// Absolute peak of the main output over the last block.
    pub fn peak(&self) -> f32 {
        self.peak.get()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            blocks_processed: self.blocks_processed(),
            active_voices: self.active_voices(),
            tail_samples: self.tail_samples(),
            peak: self.peak(),
        }
    }
}
