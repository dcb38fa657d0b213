//! Per-voice insert processors.
//!
//! A zone carries [`PROCESSORS_PER_ZONE`](mosaic_core::PROCESSORS_PER_ZONE)
//! processor slots. The slot's kind is fixed at authoring time; its two
//! parameters and mix are read from the voice's modulation matrix every block.

use mosaic_core::{StereoBlock, BLOCK_SIZE};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProcessorKind {
    /// Bypass
    #[default]
    None,
    /// `params = [cutoff (octaves above 27.5 Hz), resonance 0-1]`
    Lowpass,
    Highpass,
    Bandpass,
    /// `params = [drive dB, output trim dB]`
    Drive,
    /// `params = [bit depth 1-16, sample-hold factor 1-64]`
    BitCrush,
    /// `params = [gain dB, unused]`
    Gain,
}

/// Processor slot as stored on a zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessorStorage {
    pub kind: ProcessorKind,
    pub params: [f32; 2],
    /// Dry/wet, 0-1
    pub mix: f32,
}

impl Default for ProcessorStorage {
    fn default() -> Self {
        Self {
            kind: ProcessorKind::None,
            params: [0.0; 2],
            mix: 1.0,
        }
    }
}

impl ProcessorStorage {
    pub fn new(kind: ProcessorKind, params: [f32; 2]) -> Self {
        Self {
            kind,
            params,
            mix: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterMode {
    Lowpass,
    Highpass,
    Bandpass,
}

/// Chamberlin state-variable filter, one channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct Svf {
    low: f32,
    band: f32,
}

impl Svf {
    /// Tuning coefficients for `cutoff_hz` and `resonance` (0-1).
    #[inline]
    pub fn coefficients(cutoff_hz: f32, resonance: f32, sample_rate: f32) -> (f32, f32) {
        let cutoff = cutoff_hz.clamp(20.0, sample_rate * 0.2);
        let f = 2.0 * (PI * cutoff / sample_rate).sin();
        let q = (1.0 - resonance.clamp(0.0, 1.0) * 0.95).max(0.05);
        (f, q)
    }

    #[inline]
    pub fn tick(&mut self, input: f32, f: f32, q: f32, mode: FilterMode) -> f32 {
        let high = input - self.low - q * self.band;
        self.band += f * high;
        self.low += f * self.band;
        self.band = self.band.clamp(-8.0, 8.0);
        self.low = self.low.clamp(-8.0, 8.0);
        match mode {
            FilterMode::Lowpass => self.low,
            FilterMode::Highpass => high,
            FilterMode::Bandpass => self.band,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Runtime state of one processor slot.
#[derive(Debug, Clone)]
pub struct Processor {
    sample_rate: f32,
    filters: [Svf; 2],
    held: [f32; 2],
    hold_counter: u32,
    wet: StereoBlock,
}

impl Processor {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            filters: [Svf::default(); 2],
            held: [0.0; 2],
            hold_counter: 0,
            wet: [[0.0; BLOCK_SIZE]; 2],
        }
    }

    /// Clear filter memory for a new note.
    pub fn reset(&mut self) {
        self.filters = [Svf::default(); 2];
        self.held = [0.0; 2];
        self.hold_counter = 0;
    }

    /// Run one block in place. `params` and `mix` are the modulated values.
    pub fn process(&mut self, kind: ProcessorKind, params: [f32; 2], mix: f32, block: &mut StereoBlock) {
        let mix = mix.clamp(0.0, 1.0);
        if kind == ProcessorKind::None || mix <= 0.0 {
            return;
        }

        self.wet = *block;
        match kind {
            ProcessorKind::None => {}
            ProcessorKind::Lowpass => self.filter(FilterMode::Lowpass, params),
            ProcessorKind::Highpass => self.filter(FilterMode::Highpass, params),
            ProcessorKind::Bandpass => self.filter(FilterMode::Bandpass, params),
            ProcessorKind::Drive => {
                let drive = mosaic_core::gain::db_to_linear(params[0].clamp(0.0, 48.0));
                let trim = mosaic_core::gain::db_to_linear(params[1].clamp(-48.0, 12.0));
                for channel in self.wet.iter_mut() {
                    for s in channel.iter_mut() {
                        *s = (*s * drive).tanh() * trim;
                    }
                }
            }
            ProcessorKind::BitCrush => self.crush(params),
            ProcessorKind::Gain => {
                let gain = mosaic_core::gain::db_to_linear(params[0]);
                for channel in self.wet.iter_mut() {
                    for s in channel.iter_mut() {
                        *s *= gain;
                    }
                }
            }
        }

        let dry = 1.0 - mix;
        for (out, wet) in block.iter_mut().zip(self.wet.iter()) {
            for (o, w) in out.iter_mut().zip(wet.iter()) {
                *o = *o * dry + *w * mix;
            }
        }
    }

    fn filter(&mut self, mode: FilterMode, params: [f32; 2]) {
        let cutoff_hz = 27.5 * mosaic_synth::Exp2Table::global().exp2(params[0].clamp(0.0, 10.0));
        let (f, q) = Svf::coefficients(cutoff_hz, params[1], self.sample_rate);
        for (channel, filter) in self.wet.iter_mut().zip(self.filters.iter_mut()) {
            for s in channel.iter_mut() {
                *s = filter.tick(*s, f, q, mode);
            }
        }
    }

    fn crush(&mut self, params: [f32; 2]) {
        let levels = mosaic_synth::Exp2Table::global().exp2(params[0].clamp(1.0, 16.0) - 1.0);
        let hold = params[1].clamp(1.0, 64.0) as u32;
        for i in 0..BLOCK_SIZE {
            if self.hold_counter == 0 {
                for ch in 0..2 {
                    self.held[ch] = (self.wet[ch][i] * levels).round() / levels;
                }
            }
            self.hold_counter = (self.hold_counter + 1) % hold;
            for ch in 0..2 {
                self.wet[ch][i] = self.held[ch];
            }
        }
    }
}
