//! Bus insert effects.
//!
//! Effects are built from a serializable [`BusEffectSpec`] on the
//! serialization thread (the delay allocates its line there) and moved to the
//! audio thread boxed. Each reports how long it keeps sounding after its input
//! goes silent.

use crate::processor::{FilterMode, Svf};
use crate::{Error, Result};
use mosaic_core::gain::db_to_linear;
use mosaic_core::{StereoBlock, BLOCK_SIZE};
use serde::{Deserialize, Serialize};

/// Longest delay time accepted, in seconds.
pub const MAX_DELAY_SECONDS: f32 = 4.0;

/// Feedback level below which a repeat is considered inaudible (-60 dB).
const TAIL_FLOOR: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BusEffectSpec {
    Gain {
        db: f32,
    },
    Drive {
        drive_db: f32,
    },
    Filter {
        mode: FilterMode,
        cutoff_hz: f32,
        resonance: f32,
    },
    Delay {
        time_ms: f32,
        feedback: f32,
        /// Dry/wet, 0-1
        mix: f32,
    },
}

impl BusEffectSpec {
    pub fn name(&self) -> &'static str {
        match self {
            BusEffectSpec::Gain { .. } => "gain",
            BusEffectSpec::Drive { .. } => "drive",
            BusEffectSpec::Filter { .. } => "filter",
            BusEffectSpec::Delay { .. } => "delay",
        }
    }

    /// Reject non-finite parameters. A NaN reaching a delay line or filter
    /// state would stay there for the life of the effect.
    pub fn validate(&self) -> Result<()> {
        let finite = match *self {
            BusEffectSpec::Gain { db } => db.is_finite(),
            BusEffectSpec::Drive { drive_db } => drive_db.is_finite(),
            BusEffectSpec::Filter {
                cutoff_hz,
                resonance,
                ..
            } => cutoff_hz.is_finite() && resonance.is_finite(),
            BusEffectSpec::Delay {
                time_ms,
                feedback,
                mix,
            } => time_ms.is_finite() && feedback.is_finite() && mix.is_finite(),
        };
        if finite {
            Ok(())
        } else {
            Err(Error::InvalidParameter(format!(
                "{} effect parameters must be finite",
                self.name()
            )))
        }
    }
}

#[derive(Debug, Clone)]
pub struct StereoDelay {
    lines: [Vec<f32>; 2],
    write: usize,
    delay_samples: usize,
    feedback: f32,
    mix: f32,
}

impl StereoDelay {
    fn new(time_ms: f32, feedback: f32, mix: f32, sample_rate: f32) -> Self {
        let seconds = (time_ms * 0.001).clamp(0.0, MAX_DELAY_SECONDS);
        let delay_samples = ((seconds * sample_rate) as usize).max(1);
        Self {
            lines: [vec![0.0; delay_samples], vec![0.0; delay_samples]],
            write: 0,
            delay_samples,
            feedback: feedback.clamp(0.0, 0.99),
            mix: mix.clamp(0.0, 1.0),
        }
    }

    fn process(&mut self, block: &mut StereoBlock) {
        for i in 0..BLOCK_SIZE {
            for (ch, line) in self.lines.iter_mut().enumerate() {
                let delayed = line[self.write];
                let input = block[ch][i];
                line[self.write] = input + delayed * self.feedback;
                block[ch][i] = input * (1.0 - self.mix) + delayed * self.mix;
            }
            self.write = (self.write + 1) % self.delay_samples;
        }
    }

    /// Samples until the repeats fall below -60 dB.
    fn tail_samples(&self) -> usize {
        if self.mix <= 0.0 {
            return 0;
        }
        let repeats = if self.feedback <= TAIL_FLOOR {
            1
        } else {
            (TAIL_FLOOR.ln() / self.feedback.ln()).ceil() as usize + 1
        };
        self.delay_samples * repeats
    }
}

/// A bus insert effect.
#[derive(Debug, Clone)]
pub enum BusEffect {
    Gain {
        gain: f32,
    },
    Drive {
        drive: f32,
    },
    Filter {
        mode: FilterMode,
        f: f32,
        q: f32,
        state: [Svf; 2],
    },
    Delay(StereoDelay),
}

impl BusEffect {
    /// Build from a spec. Allocates for delays; call off the audio thread.
    pub fn from_spec(spec: &BusEffectSpec, sample_rate: f32) -> Self {
        match *spec {
            BusEffectSpec::Gain { db } => BusEffect::Gain {
                gain: db_to_linear(db),
            },
            BusEffectSpec::Drive { drive_db } => BusEffect::Drive {
                drive: db_to_linear(drive_db.clamp(0.0, 48.0)),
            },
            BusEffectSpec::Filter {
                mode,
                cutoff_hz,
                resonance,
            } => {
                let (f, q) = Svf::coefficients(cutoff_hz, resonance, sample_rate);
                BusEffect::Filter {
                    mode,
                    f,
                    q,
                    state: [Svf::default(); 2],
                }
            }
            BusEffectSpec::Delay {
                time_ms,
                feedback,
                mix,
            } => BusEffect::Delay(StereoDelay::new(time_ms, feedback, mix, sample_rate)),
        }
    }

    pub fn process(&mut self, block: &mut StereoBlock) {
        match self {
            BusEffect::Gain { gain } => {
                for s in block.iter_mut().flatten() {
                    *s *= *gain;
                }
            }
            BusEffect::Drive { drive } => {
                for s in block.iter_mut().flatten() {
                    *s = (*s * *drive).tanh();
                }
            }
            BusEffect::Filter { mode, f, q, state } => {
                for (channel, svf) in block.iter_mut().zip(state.iter_mut()) {
                    for s in channel.iter_mut() {
                        *s = svf.tick(*s, *f, *q, *mode);
                    }
                }
            }
            BusEffect::Delay(delay) => delay.process(block),
        }
    }

    /// Samples this effect keeps sounding after silent input.
    pub fn tail_samples(&self) -> usize {
        match self {
            BusEffect::Gain { .. } | BusEffect::Drive { .. } => 0,
            // A few hundred samples covers the filter's decay at any usable setting
            BusEffect::Filter { .. } => BLOCK_SIZE * 8,
            BusEffect::Delay(delay) => delay.tail_samples(),
        }
    }
}
