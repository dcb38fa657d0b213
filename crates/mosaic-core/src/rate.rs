use crate::constants::BLOCK_SIZE;

/// Sample rate and block size seen by a processing object.
///
/// Oversampled components run against a derived context whose sample rate is
/// multiplied and whose block is subdivided, so their time constants stay
/// expressed in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRateContext {
    sample_rate: f64,
    multiplier: usize,
}

impl SampleRateContext {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            multiplier: 1,
        }
    }

    /// A context running `factor` times faster than `self`.
    pub fn oversampled(&self, factor: usize) -> Self {
        let factor = factor.max(1);
        Self {
            sample_rate: self.sample_rate * factor as f64,
            multiplier: self.multiplier * factor,
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn sample_rate_inv(&self) -> f64 {
        1.0 / self.sample_rate
    }

    /// Oversampling factor relative to the engine rate.
    #[inline]
    pub fn multiplier(&self) -> usize {
        self.multiplier
    }

    /// Samples per block at this context's rate.
    #[inline]
    pub fn block_size(&self) -> usize {
        BLOCK_SIZE * self.multiplier
    }

    /// Blocks per second at the engine rate.
    #[inline]
    pub fn block_rate(&self) -> f64 {
        self.sample_rate / self.block_size() as f64
    }

    /// Duration of one block in seconds.
    #[inline]
    pub fn block_duration(&self) -> f64 {
        self.block_size() as f64 / self.sample_rate
    }
}

impl Default for SampleRateContext {
    fn default() -> Self {
        Self::new(48000.0)
    }
}
