//! Delay-Attack-Hold-Decay-Sustain-Release envelope.
//!
//! Runs at block rate: each [`process`](EnvelopeGenerator::process) call
//! advances one engine block and fills a per-sample output block by linear
//! interpolation between sub-step levels. [`OversampledEnvelope`] takes two
//! sub-steps per block against a 2x [`SampleRateContext`], giving a finer
//! piecewise-linear contour for fast attacks.
//!
//! ```text
//! Idle -> Delay -> Attack -> Hold -> Decay -> Sustain
//!   ^                                           |
//!   +------------------ Release <---------------+  (gate off from any active stage)
//! ```
//!
//! Times use the log2-seconds encoding of [`crate::tables`]; a value at or
//! below [`ENV_TIME_MIN`] completes its stage immediately.

use crate::tables::{Exp2Table, ENV_TIME_MIN};
use mosaic_core::{SampleRateContext, BLOCK_SIZE, RETRIGGER_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Envelope parameters as stored on a zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeStorage {
    /// log2 seconds
    pub delay: f32,
    pub attack: f32,
    pub hold: f32,
    pub decay: f32,
    /// Level 0.0-1.0
    pub sustain: f32,
    pub release: f32,
    /// Curvature in [-1, 1]; 0 is linear
    pub attack_shape: f32,
    pub decay_shape: f32,
    pub release_shape: f32,
}

impl Default for EnvelopeStorage {
    fn default() -> Self {
        Self {
            delay: ENV_TIME_MIN,
            attack: -7.0,
            hold: ENV_TIME_MIN,
            decay: -2.0,
            sustain: 1.0,
            release: -3.0,
            attack_shape: 0.0,
            decay_shape: 0.0,
            release_shape: 0.0,
        }
    }
}

impl EnvelopeStorage {
    /// Every time at its minimum: gate-on jumps to sustain, gate-off to idle.
    pub fn instant(sustain: f32) -> Self {
        Self {
            delay: ENV_TIME_MIN,
            attack: ENV_TIME_MIN,
            hold: ENV_TIME_MIN,
            decay: ENV_TIME_MIN,
            sustain,
            release: ENV_TIME_MIN,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvStage {
    #[default]
    Idle,
    Delay,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
}

impl EnvStage {
    /// Stages a gate-off moves into release.
    #[inline]
    pub fn is_gated(self) -> bool {
        matches!(
            self,
            EnvStage::Delay | EnvStage::Attack | EnvStage::Hold | EnvStage::Decay | EnvStage::Sustain
        )
    }
}

/// Sub-steps per engine block.
pub trait Oversampling: Send + 'static {
    const FACTOR: usize;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BlockRate;

impl Oversampling for BlockRate {
    const FACTOR: usize = 1;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Oversample2x;

impl Oversampling for Oversample2x {
    const FACTOR: usize = 2;
}

/// Envelope stepped once per block.
pub type Envelope = EnvelopeGenerator<BlockRate>;

/// Envelope stepped twice per block.
pub type OversampledEnvelope = EnvelopeGenerator<Oversample2x>;

#[derive(Debug, Clone)]
pub struct EnvelopeGenerator<O: Oversampling> {
    context: SampleRateContext,
    stage: EnvStage,
    phase: f32,
    output: f32,
    stage_start: f32,
    previous_retrigger: f32,
    output_block: [f32; BLOCK_SIZE],
    _rate: PhantomData<O>,
}

impl<O: Oversampling> EnvelopeGenerator<O> {
    pub fn new(engine_rate: SampleRateContext) -> Self {
        Self {
            context: engine_rate.oversampled(O::FACTOR),
            stage: EnvStage::Idle,
            phase: 0.0,
            output: 0.0,
            stage_start: 0.0,
            previous_retrigger: 0.0,
            output_block: [0.0; BLOCK_SIZE],
            _rate: PhantomData,
        }
    }

    /// Rate context this envelope steps against.
    pub fn context(&self) -> &SampleRateContext {
        &self.context
    }

    /// Gate on from silence.
    pub fn attack(&mut self) {
        self.stage = EnvStage::Delay;
        self.phase = 0.0;
        self.output = 0.0;
        self.stage_start = 0.0;
        self.previous_retrigger = 0.0;
        self.output_block = [0.0; BLOCK_SIZE];
    }

    /// Gate off now, independent of the `gated` argument of `process`.
    pub fn release(&mut self) {
        if self.stage.is_gated() {
            self.enter(EnvStage::Release);
        }
    }

    /// Drop straight to idle.
    pub fn reset(&mut self) {
        self.stage = EnvStage::Idle;
        self.phase = 0.0;
        self.output = 0.0;
        self.stage_start = 0.0;
        self.output_block = [0.0; BLOCK_SIZE];
    }

    #[inline]
    pub fn stage(&self) -> EnvStage {
        self.stage
    }

    #[inline]
    pub fn output(&self) -> f32 {
        self.output
    }

    /// Per-sample contour of the last processed block.
    #[inline]
    pub fn output_block(&self) -> &[f32; BLOCK_SIZE] {
        &self.output_block
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.stage == EnvStage::Idle
    }

    /// Advance one block.
    ///
    /// `rate_octaves` speeds every stage up by `2^rate_octaves`. A gate that
    /// is off moves any active stage to release. A rising edge of
    /// `retrigger` across 0.5 restarts from the current level.
    pub fn process(
        &mut self,
        params: &EnvelopeStorage,
        rate_octaves: f32,
        gated: bool,
        retrigger: f32,
    ) {
        let rising = self.previous_retrigger < RETRIGGER_THRESHOLD
            && retrigger >= RETRIGGER_THRESHOLD;
        self.previous_retrigger = retrigger;

        if rising && gated && self.stage != EnvStage::Idle {
            self.stage_start = self.output;
            self.stage = EnvStage::Delay;
            self.phase = 0.0;
        }

        if !gated && self.stage.is_gated() {
            self.enter(EnvStage::Release);
        }

        if self.stage == EnvStage::Idle {
            self.output_block = [0.0; BLOCK_SIZE];
            return;
        }

        let table = Exp2Table::global();
        let step_seconds =
            (BLOCK_SIZE as f64 * self.context.sample_rate_inv()) as f32 * table.exp2(rate_octaves);
        let sub_len = BLOCK_SIZE / O::FACTOR;

        for sub in 0..O::FACTOR {
            let from = self.output;
            self.step(params, step_seconds, table);
            let to = self.output;

            let chunk = &mut self.output_block[sub * sub_len..(sub + 1) * sub_len];
            let inc = (to - from) / sub_len as f32;
            for (i, out) in chunk.iter_mut().enumerate() {
                *out = from + inc * (i + 1) as f32;
            }
        }
    }

    fn enter(&mut self, stage: EnvStage) {
        self.stage_start = self.output;
        self.stage = stage;
        self.phase = 0.0;
    }

    /// One sub-step of `step_seconds` (already rate-scaled).
    fn step(&mut self, params: &EnvelopeStorage, step_seconds: f32, table: &Exp2Table) {
        let sustain = params.sustain.clamp(0.0, 1.0);

        // Zero-length stages fall through within the same sub-step.
        for _ in 0..7 {
            let time = match self.stage {
                EnvStage::Idle => {
                    self.output = 0.0;
                    return;
                }
                EnvStage::Sustain => {
                    self.output = sustain;
                    return;
                }
                EnvStage::Delay => params.delay,
                EnvStage::Attack => params.attack,
                EnvStage::Hold => params.hold,
                EnvStage::Decay => params.decay,
                EnvStage::Release => params.release,
            };

            let delta = match table.env_time_inv_seconds(time) {
                Some(inv) => step_seconds * inv,
                None => 1.0,
            };
            self.phase = (self.phase + delta).min(1.0);
            let x = self.phase;

            self.output = match self.stage {
                EnvStage::Delay => self.stage_start,
                EnvStage::Attack => {
                    self.stage_start + (1.0 - self.stage_start) * shape(x, params.attack_shape)
                }
                EnvStage::Hold => 1.0,
                EnvStage::Decay => sustain + (1.0 - sustain) * (1.0 - shape(x, params.decay_shape)),
                EnvStage::Release => self.stage_start * (1.0 - shape(x, params.release_shape)),
                EnvStage::Idle | EnvStage::Sustain => self.output,
            }
            .clamp(0.0, 1.0);

            if self.phase < 1.0 {
                return;
            }

            let next = match self.stage {
                EnvStage::Delay => EnvStage::Attack,
                EnvStage::Attack => EnvStage::Hold,
                EnvStage::Hold => EnvStage::Decay,
                EnvStage::Decay => EnvStage::Sustain,
                EnvStage::Release => EnvStage::Idle,
                other => other,
            };
            self.enter(next);
            if next == EnvStage::Idle {
                self.output = 0.0;
                return;
            }
        }
    }
}

/// Curvature: `x^(2^(2k))`; `k > 0` bends late, `k < 0` bends early.
#[inline]
fn shape(x: f32, k: f32) -> f32 {
    if k.abs() < 1e-4 {
        x
    } else {
        x.powf((2.0 * k.clamp(-1.0, 1.0)).exp2())
    }
}
