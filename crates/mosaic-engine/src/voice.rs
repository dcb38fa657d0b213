//! One playing note.
//!
//! Per block: modulators → matrix → sample playback → processors → amp
//! envelope, level and pan → output block. Rate and retrigger destinations
//! are read from the previous block's matrix output, since the modulators
//! that feed the matrix must run before it.

use crate::playback::SamplePlayback;
use crate::processor::Processor;
use crate::zone::{PlayMode, ZoneData};
use mosaic_core::gain::{db_to_linear, stereo_balance};
use mosaic_core::{
    Sample, SampleRateContext, StereoBlock, BLOCK_SIZE, LFOS_PER_GROUP, LFOS_PER_ZONE,
    PROCESSORS_PER_ZONE,
};
use mosaic_synth::{
    Envelope, Exp2Table, ModDest, ModSource, ModulationMatrix, Modulator, OversampledEnvelope,
    SourceLayout,
};
use std::sync::Arc;

const AMP_ENV: usize = 0;
const ENV2: usize = 1;
const LFO1: usize = 2;
const VELOCITY: usize = 5;
const RELEASE_VELOCITY: usize = 6;
const KEY_TRACK: usize = 7;
const RANDOM: usize = 8;
const GROUP_LFO1: usize = 9;
const SOURCE_COUNT: usize = 11;

/// Where each voice-owned source lives in [`Voice`]'s live value array.
pub fn voice_source_layout() -> SourceLayout {
    SourceLayout::empty()
        .with(ModSource::AmpEnv, AMP_ENV as u8)
        .with(ModSource::Env2, ENV2 as u8)
        .with(ModSource::Lfo1, LFO1 as u8)
        .with(ModSource::Lfo2, LFO1 as u8 + 1)
        .with(ModSource::Lfo3, LFO1 as u8 + 2)
        .with(ModSource::Velocity, VELOCITY as u8)
        .with(ModSource::ReleaseVelocity, RELEASE_VELOCITY as u8)
        .with(ModSource::KeyTrack, KEY_TRACK as u8)
        .with(ModSource::Random, RANDOM as u8)
        .with(ModSource::GroupLfo1, GROUP_LFO1 as u8)
        .with(ModSource::GroupLfo2, GROUP_LFO1 as u8 + 1)
}

/// Note-on parameters for [`Voice::start`].
#[derive(Debug, Clone, Copy)]
pub struct NoteStart {
    pub part: usize,
    pub group: usize,
    pub key: u8,
    /// 0-1
    pub velocity: f32,
    /// Semitones
    pub detune: f32,
    /// Key/velocity crossfade gain of the zone
    pub crossfade: f32,
    pub seed: u32,
}

/// Signal of a voice that was cut short, faded to zero over one block.
#[derive(Debug, Clone, Copy)]
pub struct FadeTail {
    pub part: usize,
    pub group: usize,
    pub block: StereoBlock,
}

/// A single playing zone instance. Pre-allocated in the pool; `start` rebinds it.
#[derive(Debug, Clone)]
pub struct Voice {
    active: bool,
    zone: ZoneData,
    sample: Option<Arc<Sample>>,
    part: usize,
    group: usize,
    key: u8,
    velocity: f32,
    detune: f32,
    crossfade: f32,
    gated: bool,
    engine_rate: f64,

    amp_env: OversampledEnvelope,
    env2: Envelope,
    lfos: [Modulator; LFOS_PER_ZONE],
    sources: [f32; SOURCE_COUNT],
    matrix: ModulationMatrix,
    processors: [Processor; PROCESSORS_PER_ZONE],
    playback: SamplePlayback,

    output: StereoBlock,
    group_lfos: [f32; LFOS_PER_GROUP],
}

impl Voice {
    pub fn new(context: SampleRateContext) -> Self {
        let sample_rate = context.sample_rate() as f32;
        Self {
            active: false,
            zone: ZoneData::default(),
            sample: None,
            part: 0,
            group: 0,
            key: 0,
            velocity: 0.0,
            detune: 0.0,
            crossfade: 1.0,
            gated: false,
            engine_rate: context.sample_rate(),
            amp_env: OversampledEnvelope::new(context),
            env2: Envelope::new(context),
            lfos: std::array::from_fn(|_| Modulator::new(context)),
            sources: [0.0; SOURCE_COUNT],
            matrix: ModulationMatrix::new(),
            processors: std::array::from_fn(|_| Processor::new(sample_rate)),
            playback: SamplePlayback::default(),
            output: [[0.0; BLOCK_SIZE]; 2],
            group_lfos: [0.0; LFOS_PER_GROUP],
        }
    }

    /// Bind a zone and start its envelopes gated.
    pub fn start(&mut self, zone: &ZoneData, sample: Arc<Sample>, note: NoteStart) {
        self.playback.start(&sample, &zone.region);
        self.zone = *zone;
        self.sample = Some(sample);
        self.part = note.part;
        self.group = note.group;
        self.key = note.key;
        self.velocity = note.velocity.clamp(0.0, 1.0);
        self.detune = note.detune;
        self.crossfade = note.crossfade;
        self.gated = true;
        self.active = true;

        self.matrix.clear();
        self.matrix.snap_routing_from_zone(&zone.routing);
        self.matrix.copy_base_values_from_zone(&zone.base_values());
        self.matrix.attach_sources(&voice_source_layout());

        self.amp_env.attack();
        self.env2.attack();
        for (i, (lfo, storage)) in self.lfos.iter_mut().zip(zone.lfos.iter()).enumerate() {
            lfo.attack(storage, note.seed.wrapping_add(i as u32 * 0x68E3_1DA4));
        }
        for processor in &mut self.processors {
            processor.reset();
        }

        self.sources = [0.0; SOURCE_COUNT];
        self.sources[VELOCITY] = self.velocity;
        self.sources[KEY_TRACK] = (note.key as f32 - 60.0) / 12.0;
        let mut seed = note.seed.max(1);
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        self.sources[RANDOM] = (seed as f32 / u32::MAX as f32) * 2.0 - 1.0;
    }

    /// Gate off. One-shot zones ignore it.
    pub fn release(&mut self, release_velocity: f32) {
        if !self.active || self.zone.play_mode == PlayMode::OneShot {
            return;
        }
        self.gated = false;
        self.sources[RELEASE_VELOCITY] = release_velocity.clamp(0.0, 1.0);
        self.amp_env.release();
        self.env2.release();
        for lfo in &mut self.lfos {
            lfo.release();
        }
    }

    /// Render one more block of the current signal under a 1 → 0 ramp and go
    /// idle. Used when the voice is stolen or on panic; `None` if it was idle.
    pub fn fade_out(&mut self) -> Option<FadeTail> {
        if !self.active {
            return None;
        }
        let group_lfos = self.group_lfos;
        self.render(group_lfos);

        let mut block = self.output;
        let step = 1.0 / BLOCK_SIZE as f32;
        for channel in block.iter_mut() {
            for (i, s) in channel.iter_mut().enumerate() {
                *s *= 1.0 - step * (i + 1) as f32;
            }
        }
        self.deactivate();
        Some(FadeTail {
            part: self.part,
            group: self.group,
            block,
        })
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.gated = false;
        self.amp_env.reset();
        self.env2.reset();
        self.playback.stop();
    }

    /// Advance one block. Returns `false` once the voice has finished and
    /// should go back to the pool.
    pub fn process(&mut self, group_lfos: [f32; LFOS_PER_GROUP]) -> bool {
        if !self.active {
            return false;
        }
        self.group_lfos = group_lfos;
        self.render(group_lfos);

        let done = self.playback.is_finished() || self.amp_env.is_idle();
        if done {
            self.deactivate();
        }
        !done
    }

    fn render(&mut self, group_lfos: [f32; LFOS_PER_GROUP]) {
        let Some(sample) = self.sample.as_ref() else {
            self.output = [[0.0; BLOCK_SIZE]; 2];
            return;
        };

        // Modulators, driven by last block's rate and retrigger values
        let previous = *self.matrix.values();
        self.amp_env.process(
            &self.zone.envelopes[0],
            previous.get(ModDest::AmpEnvRate),
            self.gated,
            previous.get(ModDest::AmpEnvRetrigger),
        );
        self.env2.process(
            &self.zone.envelopes[1],
            previous.get(ModDest::Env2Rate),
            self.gated,
            previous.get(ModDest::Env2Retrigger),
        );
        for (slot, (lfo, storage)) in self.lfos.iter_mut().zip(self.zone.lfos.iter()).enumerate() {
            self.sources[LFO1 + slot] =
                lfo.process(storage, previous.get(ModDest::lfo_rate(slot)), self.gated);
        }
        self.sources[AMP_ENV] = self.amp_env.output();
        self.sources[ENV2] = self.env2.output();
        self.sources[GROUP_LFO1..GROUP_LFO1 + LFOS_PER_GROUP].copy_from_slice(&group_lfos);

        self.matrix.process(&self.sources);

        // Sample generator
        let table = Exp2Table::global();
        let semitones = self.key as f32 - self.zone.root_key as f32
            + self.matrix.value(ModDest::Pitch)
            + self.detune;
        let ratio = table.semitones_to_ratio(semitones) as f64 * sample.sample_rate() / self.engine_rate;
        self.playback.render(sample, ratio, self.gated, &mut self.output);

        // Processor chain
        for (slot, processor) in self.processors.iter_mut().enumerate() {
            let storage = &self.zone.processors[slot];
            processor.process(
                storage.kind,
                [
                    self.matrix.value(ModDest::processor_param(slot, 0)),
                    self.matrix.value(ModDest::processor_param(slot, 1)),
                ],
                self.matrix.value(ModDest::processor_mix(slot)),
                &mut self.output,
            );
        }

        // Amp envelope, level and pan
        let tracking = self.zone.velocity_tracking.clamp(0.0, 1.0);
        let velocity_gain = 1.0 - tracking + tracking * self.velocity;
        let gain = db_to_linear(self.matrix.value(ModDest::Volume)) * velocity_gain * self.crossfade;
        let (left, right) = stereo_balance(self.matrix.value(ModDest::Pan));
        let contour = self.amp_env.output_block();
        for i in 0..BLOCK_SIZE {
            let amp = contour[i] * gain;
            self.output[0][i] *= amp * left;
            self.output[1][i] *= amp * right;
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn part(&self) -> usize {
        self.part
    }

    #[inline]
    pub fn group(&self) -> usize {
        self.group
    }

    #[inline]
    pub fn key(&self) -> u8 {
        self.key
    }

    #[inline]
    pub fn is_gated(&self) -> bool {
        self.gated
    }

    #[inline]
    pub fn output(&self) -> &StereoBlock {
        &self.output
    }

    /// Current amp envelope level, for quietest-voice stealing.
    #[inline]
    pub fn level(&self) -> f32 {
        self.amp_env.output()
    }

    pub fn matrix(&self) -> &ModulationMatrix {
        &self.matrix
    }
}
