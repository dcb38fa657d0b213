//! Block-rate modulators for LFO slots.
//!
//! Every slot carries a [`ModulatorShape`] tag chosen by the zone or group:
//! a step sequencer, a classic curve, an envelope, or a multi-segment
//! envelope (MSEG). The audio thread matches on the tag once per slot per
//! block and produces a single scalar output.

use crate::envelope::{Envelope, EnvelopeStorage};
use crate::tables::Exp2Table;
use mosaic_core::SampleRateContext;
use serde::{Deserialize, Serialize};

pub const MAX_STEPS: usize = 16;
pub const MAX_MSEG_SEGMENTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CurveShape {
    #[default]
    Sine,
    Triangle,
    Square,
    SawUp,
    SawDown,
    /// Sample and hold, new value each cycle
    Noise,
    /// Noise with linear glide between values
    SmoothNoise,
}

impl CurveShape {
    /// Bipolar value at `phase` in [0, 1). Noise shapes are handled by the
    /// modulator's random state and evaluate to zero here.
    #[inline]
    pub fn evaluate(&self, phase: f32) -> f32 {
        match self {
            CurveShape::Sine => (phase * std::f32::consts::TAU).sin(),
            CurveShape::Triangle => {
                let p = phase * 4.0;
                if p < 1.0 {
                    p
                } else if p < 3.0 {
                    2.0 - p
                } else {
                    p - 4.0
                }
            }
            CurveShape::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            CurveShape::SawUp => phase * 2.0 - 1.0,
            CurveShape::SawDown => 1.0 - phase * 2.0,
            CurveShape::Noise | CurveShape::SmoothNoise => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepStorage {
    /// Step values in [-1, 1]
    pub steps: [f32; MAX_STEPS],
    pub length: u8,
    /// Fraction of each step spent gliding into the next (0 = hard steps)
    pub smooth: f32,
}

impl Default for StepStorage {
    fn default() -> Self {
        let mut steps = [0.0; MAX_STEPS];
        for (i, step) in steps.iter_mut().enumerate() {
            *step = if i % 2 == 0 { 1.0 } else { -1.0 };
        }
        Self {
            steps,
            length: MAX_STEPS as u8,
            smooth: 0.0,
        }
    }
}

impl StepStorage {
    pub fn from_steps(values: &[f32]) -> Self {
        let mut steps = [0.0; MAX_STEPS];
        let length = values.len().clamp(1, MAX_STEPS);
        steps[..length.min(values.len())].copy_from_slice(&values[..length.min(values.len())]);
        Self {
            steps,
            length: length as u8,
            smooth: 0.0,
        }
    }

    fn evaluate(&self, phase: f32) -> f32 {
        let length = (self.length as usize).clamp(1, MAX_STEPS);
        let pos = phase * length as f32;
        let index = (pos as usize).min(length - 1);
        let current = self.steps[index];

        let smooth = self.smooth.clamp(0.0, 1.0);
        if smooth <= 0.0 {
            return current;
        }
        let next = self.steps[(index + 1) % length];
        let frac = pos - index as f32;
        let t = ((frac - (1.0 - smooth)) / smooth).clamp(0.0, 1.0);
        current + (next - current) * t
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MsegSegment {
    /// Relative duration; segments share one cycle in proportion
    pub duration: f32,
    /// Level reached at the end of the segment, in [-1, 1]
    pub level: f32,
    /// Curvature in [-1, 1]
    pub curve: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MsegStorage {
    pub segments: [MsegSegment; MAX_MSEG_SEGMENTS],
    pub count: u8,
    pub start_level: f32,
}

impl Default for MsegStorage {
    fn default() -> Self {
        Self::from_segments(
            -1.0,
            &[
                MsegSegment {
                    duration: 1.0,
                    level: 1.0,
                    curve: 0.0,
                },
                MsegSegment {
                    duration: 1.0,
                    level: -1.0,
                    curve: 0.0,
                },
            ],
        )
    }
}

impl MsegStorage {
    pub fn from_segments(start_level: f32, segments: &[MsegSegment]) -> Self {
        let count = segments.len().min(MAX_MSEG_SEGMENTS);
        let mut storage = [MsegSegment::default(); MAX_MSEG_SEGMENTS];
        storage[..count].copy_from_slice(&segments[..count]);
        Self {
            segments: storage,
            count: count as u8,
            start_level,
        }
    }

    fn evaluate(&self, phase: f32) -> f32 {
        let count = (self.count as usize).min(MAX_MSEG_SEGMENTS);
        let segments = &self.segments[..count];
        let total: f32 = segments.iter().map(|s| s.duration.max(0.0)).sum();
        if total <= 0.0 {
            return self.start_level;
        }

        let mut t = phase.clamp(0.0, 1.0) * total;
        let mut from = self.start_level;
        for segment in segments {
            let duration = segment.duration.max(0.0);
            if t <= duration && duration > 0.0 {
                let x = t / duration;
                let k = segment.curve.clamp(-1.0, 1.0);
                let shaped = if k.abs() < 1e-4 {
                    x
                } else {
                    x.powf((2.0 * k).exp2())
                };
                return from + (segment.level - from) * shaped;
            }
            t -= duration;
            from = segment.level;
        }
        from
    }
}

/// What an LFO slot produces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ModulatorShape {
    Step(StepStorage),
    Curve(CurveShape),
    Env(EnvelopeStorage),
    Mseg(MsegStorage),
}

impl Default for ModulatorShape {
    fn default() -> Self {
        ModulatorShape::Curve(CurveShape::Sine)
    }
}

/// Phase behavior at note-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerMode {
    /// Restart at `phase_offset` on every note
    #[default]
    KeyTrigger,
    /// Start at a random phase
    Random,
    /// Run a single cycle then hold the last value
    OneShot,
}

/// LFO slot parameters as stored on a zone or group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModulatorStorage {
    pub shape: ModulatorShape,
    /// log2 Hz; 0.0 is 1 Hz
    pub rate: f32,
    pub phase_offset: f32,
    pub unipolar: bool,
    pub trigger: TriggerMode,
}

impl Default for ModulatorStorage {
    fn default() -> Self {
        Self {
            shape: ModulatorShape::default(),
            rate: 0.0,
            phase_offset: 0.0,
            unipolar: false,
            trigger: TriggerMode::KeyTrigger,
        }
    }
}

impl ModulatorStorage {
    pub fn curve(shape: CurveShape, rate: f32) -> Self {
        Self {
            shape: ModulatorShape::Curve(shape),
            rate,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
struct RandomState {
    current: f32,
    previous: f32,
    seed: u32,
}

impl RandomState {
    fn new(seed: u32) -> Self {
        let mut state = Self {
            current: 0.0,
            previous: 0.0,
            seed: seed.max(1),
        };
        state.current = state.next();
        state.previous = state.current;
        state
    }

    fn next(&mut self) -> f32 {
        self.seed ^= self.seed << 13;
        self.seed ^= self.seed >> 17;
        self.seed ^= self.seed << 5;
        (self.seed as f32 / u32::MAX as f32) * 2.0 - 1.0
    }

    fn advance(&mut self) {
        self.previous = self.current;
        self.current = self.next();
    }
}

/// Runtime state of one LFO slot.
#[derive(Debug, Clone)]
pub struct Modulator {
    block_seconds: f32,
    phase: f32,
    output: f32,
    finished: bool,
    random: RandomState,
    envelope: Envelope,
}

impl Modulator {
    pub fn new(engine_rate: SampleRateContext) -> Self {
        Self {
            block_seconds: engine_rate.block_duration() as f32,
            phase: 0.0,
            output: 0.0,
            finished: false,
            random: RandomState::new(0x9E37_79B9),
            envelope: Envelope::new(engine_rate),
        }
    }

    /// Note-on (or group start). `seed` feeds random phase and noise shapes.
    pub fn attack(&mut self, storage: &ModulatorStorage, seed: u32) {
        self.random = RandomState::new(seed ^ 0x9E37_79B9);
        self.finished = false;
        self.phase = match storage.trigger {
            TriggerMode::Random => (self.random.next() + 1.0) * 0.5,
            TriggerMode::KeyTrigger | TriggerMode::OneShot => storage.phase_offset,
        }
        .rem_euclid(1.0);

        if let ModulatorShape::Env(_) = storage.shape {
            self.envelope.attack();
        }
        self.output = self.evaluate(storage);
    }

    pub fn release(&mut self) {
        self.envelope.release();
    }

    #[inline]
    pub fn output(&self) -> f32 {
        self.output
    }

    #[inline]
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Advance one block. `rate_octaves` is added to the stored rate.
    pub fn process(&mut self, storage: &ModulatorStorage, rate_octaves: f32, gated: bool) -> f32 {
        if let ModulatorShape::Env(params) = &storage.shape {
            self.envelope.process(params, storage.rate + rate_octaves, gated, 0.0);
            self.output = self.envelope.output();
            return self.output;
        }

        if !self.finished {
            let hz = Exp2Table::global().lfo_rate_hz(storage.rate + rate_octaves);
            let next = self.phase + hz * self.block_seconds;
            if next >= 1.0 {
                if storage.trigger == TriggerMode::OneShot {
                    self.phase = 1.0;
                    self.finished = true;
                } else {
                    self.phase = next.fract();
                    self.random.advance();
                }
            } else {
                self.phase = next;
            }
        }

        self.output = self.evaluate(storage);
        self.output
    }

    fn evaluate(&self, storage: &ModulatorStorage) -> f32 {
        // One-shot holds at the end of its cycle
        let phase = if self.finished { 0.999_999 } else { self.phase };
        let bipolar = match &storage.shape {
            ModulatorShape::Curve(CurveShape::Noise) => self.random.current,
            ModulatorShape::Curve(CurveShape::SmoothNoise) => {
                self.random.previous + (self.random.current - self.random.previous) * phase
            }
            ModulatorShape::Curve(shape) => shape.evaluate(phase),
            ModulatorShape::Step(steps) => steps.evaluate(phase),
            ModulatorShape::Mseg(mseg) => mseg.evaluate(phase),
            ModulatorShape::Env(_) => return self.envelope.output(),
        };

        if storage.unipolar {
            (bipolar + 1.0) * 0.5
        } else {
            bipolar
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ctx() -> SampleRateContext {
        SampleRateContext::new(48000.0)
    }

    fn blocks_per_second() -> usize {
        (48000 / mosaic_core::BLOCK_SIZE) as usize
    }

    #[test]
    fn test_curve_shapes() {
        assert_relative_eq!(CurveShape::Sine.evaluate(0.25), 1.0, epsilon = 1e-6);
        assert_relative_eq!(CurveShape::Triangle.evaluate(0.25), 1.0, epsilon = 1e-6);
        assert_relative_eq!(CurveShape::Triangle.evaluate(0.75), -1.0, epsilon = 1e-6);
        assert_eq!(CurveShape::Square.evaluate(0.1), 1.0);
        assert_eq!(CurveShape::SawUp.evaluate(0.0), -1.0);
        assert_eq!(CurveShape::SawDown.evaluate(0.0), 1.0);
    }

    #[test]
    fn test_one_hz_cycle() {
        let storage = ModulatorStorage::curve(CurveShape::SawUp, 0.0);
        let mut lfo = Modulator::new(ctx());
        lfo.attack(&storage, 1);
        assert_eq!(lfo.phase(), 0.0);

        for _ in 0..blocks_per_second() / 2 {
            lfo.process(&storage, 0.0, true);
        }
        assert_relative_eq!(lfo.phase(), 0.5, epsilon = 1e-3);
        assert_relative_eq!(lfo.output(), 0.0, epsilon = 1e-2);
    }

    #[test]
    fn test_rate_modulation_in_octaves() {
        let storage = ModulatorStorage::curve(CurveShape::Sine, 0.0);
        let mut lfo = Modulator::new(ctx());
        lfo.attack(&storage, 1);
        for _ in 0..blocks_per_second() / 8 {
            lfo.process(&storage, 1.0, true);
        }
        // 2 Hz for 1/8 s is a quarter cycle
        assert_relative_eq!(lfo.phase(), 0.25, epsilon = 1e-3);
    }

    #[test]
    fn test_unipolar_range() {
        let storage = ModulatorStorage {
            unipolar: true,
            ..ModulatorStorage::curve(CurveShape::Triangle, 2.0)
        };
        let mut lfo = Modulator::new(ctx());
        lfo.attack(&storage, 7);
        for _ in 0..1000 {
            let v = lfo.process(&storage, 0.0, true);
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_one_shot_holds() {
        let storage = ModulatorStorage {
            trigger: TriggerMode::OneShot,
            ..ModulatorStorage::curve(CurveShape::SawUp, 3.0)
        };
        let mut lfo = Modulator::new(ctx());
        lfo.attack(&storage, 1);
        for _ in 0..blocks_per_second() {
            lfo.process(&storage, 0.0, true);
        }
        let held = lfo.output();
        assert!(held > 0.99);
        lfo.process(&storage, 0.0, true);
        assert_eq!(lfo.output(), held);
    }

    #[test]
    fn test_step_sequence() {
        let steps = StepStorage::from_steps(&[0.0, 0.5, 1.0, -1.0]);
        assert_eq!(steps.evaluate(0.1), 0.0);
        assert_eq!(steps.evaluate(0.3), 0.5);
        assert_eq!(steps.evaluate(0.6), 1.0);
        assert_eq!(steps.evaluate(0.9), -1.0);
    }

    #[test]
    fn test_step_smoothing_glides() {
        let mut steps = StepStorage::from_steps(&[0.0, 1.0]);
        steps.smooth = 0.5;
        assert_eq!(steps.evaluate(0.1), 0.0);
        let mid = steps.evaluate(0.375);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn test_mseg_segments() {
        let mseg = MsegStorage::from_segments(
            0.0,
            &[
                MsegSegment {
                    duration: 1.0,
                    level: 1.0,
                    curve: 0.0,
                },
                MsegSegment {
                    duration: 3.0,
                    level: -1.0,
                    curve: 0.0,
                },
            ],
        );
        assert_relative_eq!(mseg.evaluate(0.0), 0.0);
        assert_relative_eq!(mseg.evaluate(0.125), 0.5, epsilon = 1e-6);
        assert_relative_eq!(mseg.evaluate(0.25), 1.0, epsilon = 1e-6);
        assert_relative_eq!(mseg.evaluate(0.625), 0.0, epsilon = 1e-6);
        assert_relative_eq!(mseg.evaluate(1.0), -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_env_slot_follows_gate() {
        let storage = ModulatorStorage {
            shape: ModulatorShape::Env(EnvelopeStorage::instant(0.7)),
            ..ModulatorStorage::default()
        };
        let mut lfo = Modulator::new(ctx());
        lfo.attack(&storage, 1);
        assert_relative_eq!(lfo.process(&storage, 0.0, true), 0.7, epsilon = 1e-6);
        assert_eq!(lfo.process(&storage, 0.0, false), 0.0);
    }

    #[test]
    fn test_noise_changes_each_cycle_and_is_seeded() {
        let storage = ModulatorStorage::curve(CurveShape::Noise, 4.0);
        let mut a = Modulator::new(ctx());
        let mut b = Modulator::new(ctx());
        a.attack(&storage, 42);
        b.attack(&storage, 42);
        let first = a.output();
        let mut changed = false;
        for _ in 0..200 {
            let va = a.process(&storage, 0.0, true);
            let vb = b.process(&storage, 0.0, true);
            assert_eq!(va, vb);
            changed |= va != first;
        }
        assert!(changed);
    }

    #[test]
    fn test_random_trigger_phase_in_range() {
        let storage = ModulatorStorage {
            trigger: TriggerMode::Random,
            ..ModulatorStorage::default()
        };
        let mut lfo = Modulator::new(ctx());
        for seed in 1..50 {
            lfo.attack(&storage, seed);
            assert!((0.0..1.0).contains(&lfo.phase()));
        }
    }
}
