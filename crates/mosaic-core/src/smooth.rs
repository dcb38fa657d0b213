//! Per-sample level ramps for bus VCA and pan.
//!
//! A new target restarts a linear ramp from wherever the value is now, so an
//! edit landing mid-ramp bends the curve instead of jumping.

/// Linear ramp toward the most recent target.
#[derive(Debug, Clone)]
pub struct SmoothedValue {
    value: f32,
    target: f32,
    increment: f32,
    remaining: u32,
    ramp_len: u32,
}

impl SmoothedValue {
    /// Start settled at `initial`; later targets ramp over `seconds`.
    pub fn new(initial: f32, seconds: f32, sample_rate: f32) -> Self {
        Self {
            value: initial,
            target: initial,
            increment: 0.0,
            remaining: 0,
            ramp_len: (seconds * sample_rate).max(1.0) as u32,
        }
    }

    #[inline]
    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        self.target = target;
        self.remaining = self.ramp_len;
        self.increment = (target - self.value) / self.ramp_len as f32;
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        match self.remaining {
            0 => {}
            // Land exactly; accumulated increments drift
            1 => {
                self.value = self.target;
                self.remaining = 0;
            }
            _ => {
                self.value += self.increment;
                self.remaining -= 1;
            }
        }
        self.value
    }
}
