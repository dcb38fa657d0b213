//! Mixing busses.
//!
//! A bus accumulates one block, runs its insert effects and a smoothed VCA
//! (level, pan, mute). Part busses keep three snapshots of their signal so
//! sends can tap it at any point of that chain in the same pass:
//!
//! ```text
//! input ──► [pre-FX] ──► effects ──► [post-FX, pre-VCA] ──► VCA ──► [post-VCA] ──► output routing
//! ```
//!
//! Ringout: a bus whose input went silent keeps processing until its own
//! effect tail plus the longest tail feeding it has elapsed.

mod effect;

pub use effect::{BusEffect, BusEffectSpec, StereoDelay, MAX_DELAY_SECONDS};

use mosaic_core::gain::{db_to_linear, stereo_balance};
use mosaic_core::{
    SmoothedValue, StereoBlock, BLOCK_SIZE, MAX_BUS_EFFECTS, NUM_AUX_BUSSES, NUM_PARTS,
    SILENCE_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Level/pan ramp time.
const SMOOTH_SECONDS: f32 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusAddress {
    Main,
    Part(u8),
    Aux(u8),
}

impl BusAddress {
    pub fn is_valid(&self) -> bool {
        match *self {
            BusAddress::Main => true,
            BusAddress::Part(i) => (i as usize) < NUM_PARTS,
            BusAddress::Aux(i) => (i as usize) < NUM_AUX_BUSSES,
        }
    }

    /// Part busses send to any aux; aux busses only to later aux busses.
    pub fn supports_sends(&self) -> bool {
        !matches!(self, BusAddress::Main)
    }
}

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusAddress::Main => write!(f, "main"),
            BusAddress::Part(i) => write!(f, "part{i}"),
            BusAddress::Aux(i) => write!(f, "aux{i}"),
        }
    }
}

/// Where in a bus's chain a send reads its signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SendTap {
    PreFx,
    PostFxPreVca,
    #[default]
    PostVca,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SendSettings {
    /// Linear gain into the aux bus; zero disables the send
    pub level: f32,
    pub tap: SendTap,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BusSettings {
    pub level_db: f32,
    pub pan: f32,
    pub mute: bool,
    /// 0 routes to the main bus, N to dedicated output N
    pub output: u8,
    pub sends: [SendSettings; NUM_AUX_BUSSES],
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            level_db: 0.0,
            pan: 0.0,
            mute: false,
            output: 0,
            sends: [SendSettings::default(); NUM_AUX_BUSSES],
        }
    }
}

impl BusSettings {
    fn vca_gain(&self) -> f32 {
        if self.mute {
            0.0
        } else {
            db_to_linear(self.level_db)
        }
    }
}

pub struct Bus {
    address: BusAddress,
    settings: BusSettings,
    buffer: StereoBlock,
    pre_fx: StereoBlock,
    pre_vca: StereoBlock,
    effects: [Option<Box<BusEffect>>; MAX_BUS_EFFECTS],
    level: SmoothedValue,
    pan: SmoothedValue,
    used: bool,
    active: bool,
    ringout: bool,
    /// Consecutive silent input samples; saturated until first fed
    silent_samples: usize,
    upstream_tail: usize,
}

impl Bus {
    pub fn new(address: BusAddress, sample_rate: f32) -> Self {
        let settings = BusSettings::default();
        Self {
            address,
            settings,
            buffer: [[0.0; BLOCK_SIZE]; 2],
            pre_fx: [[0.0; BLOCK_SIZE]; 2],
            pre_vca: [[0.0; BLOCK_SIZE]; 2],
            effects: Default::default(),
            level: SmoothedValue::new(settings.vca_gain(), SMOOTH_SECONDS, sample_rate),
            pan: SmoothedValue::new(settings.pan, SMOOTH_SECONDS, sample_rate),
            used: false,
            active: false,
            ringout: false,
            silent_samples: usize::MAX,
            upstream_tail: 0,
        }
    }

    #[inline]
    pub fn address(&self) -> BusAddress {
        self.address
    }

    pub fn settings(&self) -> &BusSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: BusSettings) {
        self.settings = settings;
        self.level.set_target(settings.vca_gain());
        self.pan.set_target(settings.pan.clamp(-1.0, 1.0));
    }

    /// Put `effect` in `slot` and hand back whatever was there. An invalid
    /// slot hands `effect` itself back as the error.
    pub fn replace_effect(
        &mut self,
        slot: usize,
        effect: Option<Box<BusEffect>>,
    ) -> Result<Option<Box<BusEffect>>, Option<Box<BusEffect>>> {
        match self.effects.get_mut(slot) {
            Some(target) => Ok(std::mem::replace(target, effect)),
            None => Err(effect),
        }
    }

    pub fn effect(&self, slot: usize) -> Option<&BusEffect> {
        self.effects.get(slot).and_then(|e| e.as_deref())
    }

    /// Start of block: silence the buffer and forget last block's inputs.
    pub fn clear(&mut self) {
        self.buffer = [[0.0; BLOCK_SIZE]; 2];
        self.used = false;
        self.active = false;
        self.upstream_tail = 0;
    }

    /// Mix a block in.
    #[inline]
    pub fn accumulate(&mut self, block: &StereoBlock) {
        self.accumulate_scaled(block, 1.0);
    }

    pub fn accumulate_scaled(&mut self, block: &StereoBlock, gain: f32) {
        for (out, input) in self.buffer.iter_mut().zip(block.iter()) {
            for (o, i) in out.iter_mut().zip(input.iter()) {
                *o += *i * gain;
            }
        }
        self.used = true;
    }

    /// Mark the bus as fed this block without adding signal.
    pub fn mark_used(&mut self) {
        self.used = true;
    }

    /// Record the remaining tail of a bus feeding this one.
    pub fn note_upstream_tail(&mut self, samples: usize) {
        self.upstream_tail = self.upstream_tail.max(samples);
    }

    #[inline]
    pub fn is_used(&self) -> bool {
        self.used
    }

    /// Did the last `process` produce output (fed, or ringing out)?
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Input silent but effect tail still sounding.
    #[inline]
    pub fn in_ringout(&self) -> bool {
        self.ringout
    }

    pub fn own_tail(&self) -> usize {
        self.effects.iter().flatten().map(|e| e.tail_samples()).sum()
    }

    fn own_remaining_tail(&self) -> usize {
        self.own_tail().saturating_sub(self.silent_samples)
    }

    /// Samples until this bus and everything feeding it are silent.
    pub fn remaining_tail(&self) -> usize {
        self.own_remaining_tail() + self.upstream_tail
    }

    /// Run effects and VCA over the accumulated block, capturing the tap
    /// snapshots. Returns whether the bus produced output.
    pub fn process(&mut self) -> bool {
        let peak = self
            .buffer
            .iter()
            .flatten()
            .fold(0.0f32, |peak, s| peak.max(s.abs()));
        let ringing = self.own_tail() > self.silent_samples;
        let silent = peak < SILENCE_THRESHOLD;
        if silent {
            self.silent_samples = self.silent_samples.saturating_add(BLOCK_SIZE);
        } else {
            self.silent_samples = 0;
        }

        self.ringout = silent && ringing;
        self.active = self.used || self.ringout || self.upstream_tail > 0;
        if !self.active {
            self.pre_fx = self.buffer;
            self.pre_vca = self.buffer;
            return false;
        }

        self.pre_fx = self.buffer;
        for effect in self.effects.iter_mut().flatten() {
            effect.process(&mut self.buffer);
        }
        self.pre_vca = self.buffer;

        for i in 0..BLOCK_SIZE {
            let gain = self.level.next_sample();
            let (left, right) = stereo_balance(self.pan.next_sample());
            self.buffer[0][i] *= gain * left;
            self.buffer[1][i] *= gain * right;
        }
        true
    }

    /// Signal at a send tap from the last `process`.
    pub fn tap(&self, tap: SendTap) -> &StereoBlock {
        match tap {
            SendTap::PreFx => &self.pre_fx,
            SendTap::PostFxPreVca => &self.pre_vca,
            SendTap::PostVca => &self.buffer,
        }
    }

    /// Post-VCA output of the last `process`.
    #[inline]
    pub fn output(&self) -> &StereoBlock {
        &self.buffer
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("address", &self.address)
            .field("settings", &self.settings)
            .field("used", &self.used)
            .field("silent_samples", &self.silent_samples)
            .field("upstream_tail", &self.upstream_tail)
            .finish()
    }
}
