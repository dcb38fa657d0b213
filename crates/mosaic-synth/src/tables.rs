//! Shared lookup tables for the block-rate hot path.
//!
//! Envelope times, LFO rates and pitch ratios are all powers of two of a
//! linear control value. [`Exp2Table`] answers `2^x` by linear interpolation
//! so per-block code never calls `powf`.

use std::sync::OnceLock;

/// Envelope time parameters are log2 seconds in this range.
pub const ENV_TIME_MIN: f32 = -8.0;
pub const ENV_TIME_MAX: f32 = 5.0;

/// LFO rate parameters are log2 Hz in this range.
pub const LFO_RATE_MIN: f32 = -7.0;
pub const LFO_RATE_MAX: f32 = 6.0;

const TABLE_MIN: f32 = -16.0;
const TABLE_MAX: f32 = 16.0;
const STEPS_PER_UNIT: usize = 256;
const TABLE_LEN: usize = (TABLE_MAX - TABLE_MIN) as usize * STEPS_PER_UNIT + 2;

/// `2^x` over [-16, 16], 256 points per octave.
pub struct Exp2Table {
    values: Box<[f32]>,
}

impl Exp2Table {
    fn build() -> Self {
        let values = (0..TABLE_LEN)
            .map(|i| (TABLE_MIN as f64 + i as f64 / STEPS_PER_UNIT as f64).exp2() as f32)
            .collect();
        Self { values }
    }

    /// Process-wide instance. The first call builds the table, so engines
    /// touch it during construction rather than on the audio thread.
    pub fn global() -> &'static Exp2Table {
        static TABLE: OnceLock<Exp2Table> = OnceLock::new();
        TABLE.get_or_init(Self::build)
    }

    /// `2^x`, clamped to the table range.
    #[inline]
    pub fn exp2(&self, x: f32) -> f32 {
        let pos = (x.clamp(TABLE_MIN, TABLE_MAX) - TABLE_MIN) * STEPS_PER_UNIT as f32;
        let idx = (pos as usize).min(TABLE_LEN - 2);
        let frac = pos - idx as f32;
        let a = self.values[idx];
        let b = self.values[idx + 1];
        a + (b - a) * frac
    }

    /// Frequency ratio of `semitones`.
    #[inline]
    pub fn semitones_to_ratio(&self, semitones: f32) -> f32 {
        self.exp2(semitones * (1.0 / 12.0))
    }

    /// Inverse duration in 1/seconds of a log2-seconds envelope time.
    /// Zero-length times report `None`.
    #[inline]
    pub fn env_time_inv_seconds(&self, log2_seconds: f32) -> Option<f32> {
        if log2_seconds <= ENV_TIME_MIN {
            None
        } else {
            Some(self.exp2(-log2_seconds.min(ENV_TIME_MAX)))
        }
    }

    /// Hz of a log2 LFO rate.
    #[inline]
    pub fn lfo_rate_hz(&self, log2_hz: f32) -> f32 {
        self.exp2(log2_hz.clamp(LFO_RATE_MIN, LFO_RATE_MAX))
    }
}

impl std::fmt::Debug for Exp2Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exp2Table")
            .field("len", &self.values.len())
            .finish()
    }
}
