//! Level and pan conversions.

use std::f32::consts::FRAC_PI_4;

/// Decibels to linear amplitude. Anything at or below -96 dB is silence.
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    if db <= -96.0 {
        0.0
    } else {
        10f32.powf(db * 0.05)
    }
}

#[inline]
pub fn linear_to_db(amp: f32) -> f32 {
    if amp <= 0.0 {
        -96.0
    } else {
        (20.0 * amp.log10()).max(-96.0)
    }
}

/// Constant-power pan law. `pan` in [-1, 1]; returns `(left, right)` gains,
/// both `sqrt(0.5)` at center.
#[inline]
pub fn constant_power_pan(pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4;
    (angle.cos(), angle.sin())
}

/// Balance law for stereo sources: center leaves both channels at unity,
/// moving toward one side attenuates the other linearly.
#[inline]
pub fn stereo_balance(pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    if pan < 0.0 {
        (1.0, 1.0 + pan)
    } else {
        (1.0 - pan, 1.0)
    }
}
