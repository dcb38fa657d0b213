//! Groups: a list of zones plus group-level output and modulation.

use crate::zone::Zone;
use mosaic_core::gain::{db_to_linear, stereo_balance};
use mosaic_core::{SampleRateContext, StereoBlock, BLOCK_SIZE, LFOS_PER_GROUP};
use mosaic_synth::{
    DestValues, ModDest, ModSource, ModulationMatrix, Modulator, ModulatorStorage, RoutingTable,
    SourceLayout,
};
use serde::{Deserialize, Serialize};

/// Group authoring data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupSettings {
    pub volume_db: f32,
    pub pan: f32,
    pub mute: bool,
    pub lfos: [ModulatorStorage; LFOS_PER_GROUP],
    /// Routes group LFOs to the group destinations
    pub routing: RoutingTable,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            volume_db: 0.0,
            pan: 0.0,
            mute: false,
            lfos: [ModulatorStorage::default(); LFOS_PER_GROUP],
            routing: RoutingTable::new(),
        }
    }
}

impl GroupSettings {
    fn base_values(&self) -> DestValues {
        let mut base = DestValues::zeroed();
        base.set(ModDest::GroupVolume, self.volume_db);
        base.set(ModDest::GroupPan, self.pan);
        base
    }
}

fn group_source_layout() -> SourceLayout {
    SourceLayout::empty()
        .with(ModSource::GroupLfo1, 0)
        .with(ModSource::GroupLfo2, 1)
}

/// Runtime group: zones, group modulators and the block its voices mix into.
pub struct Group {
    pub zones: Vec<Zone>,
    settings: GroupSettings,
    lfos: [Modulator; LFOS_PER_GROUP],
    lfo_values: [f32; LFOS_PER_GROUP],
    matrix: ModulationMatrix,
    output: StereoBlock,
    written: bool,
    voice_count: usize,
    starts: u32,
}

impl Group {
    pub fn new(context: SampleRateContext) -> Self {
        let settings = GroupSettings::default();
        let mut matrix = ModulationMatrix::new();
        matrix.snap_routing_from_zone(&settings.routing);
        matrix.copy_base_values_from_zone(&settings.base_values());
        matrix.attach_sources(&group_source_layout());
        Self {
            zones: Vec::new(),
            settings,
            lfos: std::array::from_fn(|_| Modulator::new(context)),
            lfo_values: [0.0; LFOS_PER_GROUP],
            matrix,
            output: [[0.0; BLOCK_SIZE]; 2],
            written: false,
            voice_count: 0,
            starts: 0,
        }
    }

    pub fn settings(&self) -> &GroupSettings {
        &self.settings
    }

    /// Swap in new settings; the previous ones are left in `settings`.
    pub fn swap_settings(&mut self, settings: &mut GroupSettings) {
        std::mem::swap(&mut self.settings, settings);
        self.matrix.snap_routing_from_zone(&self.settings.routing);
        self.matrix.copy_base_values_from_zone(&self.settings.base_values());
    }

    /// A voice of this group started. Group LFOs restart when the group
    /// goes from silent to sounding.
    pub fn voice_started(&mut self) {
        if self.voice_count == 0 {
            self.starts = self.starts.wrapping_add(1);
            for (slot, (lfo, storage)) in self.lfos.iter_mut().zip(self.settings.lfos.iter()).enumerate() {
                lfo.attack(storage, self.starts.wrapping_mul(0x2545_F491) ^ slot as u32);
            }
            self.lfo_values = [0.0; LFOS_PER_GROUP];
            for (value, lfo) in self.lfo_values.iter_mut().zip(self.lfos.iter()) {
                *value = lfo.output();
            }
        }
        self.voice_count += 1;
    }

    pub fn voice_finished(&mut self) {
        self.voice_count = self.voice_count.saturating_sub(1);
    }

    /// Forget every voice (panic).
    pub fn clear_voices(&mut self) {
        self.voice_count = 0;
    }

    #[inline]
    pub fn voice_count(&self) -> usize {
        self.voice_count
    }

    /// Start of block: clear the mix and advance group modulators.
    pub fn begin_block(&mut self) {
        self.output = [[0.0; BLOCK_SIZE]; 2];
        self.written = false;
        if self.voice_count == 0 {
            return;
        }

        let previous = *self.matrix.values();
        let gated = self.voice_count > 0;
        for (slot, (lfo, storage)) in self.lfos.iter_mut().zip(self.settings.lfos.iter()).enumerate() {
            self.lfo_values[slot] =
                lfo.process(storage, previous.get(ModDest::group_lfo_rate(slot)), gated);
        }
        self.matrix.process(&self.lfo_values);
    }

    /// Group LFO outputs voices read as `GroupLfo1`/`GroupLfo2`.
    #[inline]
    pub fn lfo_values(&self) -> [f32; LFOS_PER_GROUP] {
        self.lfo_values
    }

    #[inline]
    pub fn matrix(&self) -> &ModulationMatrix {
        &self.matrix
    }

    /// Add a voice (or fade tail) block into the group mix.
    #[inline]
    pub fn accumulate(&mut self, block: &StereoBlock) {
        for (out, input) in self.output.iter_mut().zip(block.iter()) {
            for (o, i) in out.iter_mut().zip(input.iter()) {
                *o += *i;
            }
        }
        self.written = true;
    }

    /// Apply group level and pan and add the result into `dest`.
    /// Returns `false` if nothing was mixed this block.
    pub fn mix_into(&self, dest: &mut StereoBlock) -> bool {
        if !self.written || self.settings.mute {
            return false;
        }
        let gain = db_to_linear(self.matrix.value(ModDest::GroupVolume));
        let (left, right) = stereo_balance(self.matrix.value(ModDest::GroupPan));
        for i in 0..BLOCK_SIZE {
            dest[0][i] += self.output[0][i] * gain * left;
            dest[1][i] += self.output[1][i] * gain * right;
        }
        true
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("zones", &self.zones.len())
            .field("voice_count", &self.voice_count)
            .field("settings", &self.settings)
            .finish()
    }
}
