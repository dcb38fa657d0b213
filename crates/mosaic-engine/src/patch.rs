//! The patch: parts, their busses, aux busses and the main bus.
//!
//! [`Patch::process`] runs once per block in a fixed order:
//!
//! 1. clear every bus
//! 2. render each sounding part into its part bus
//! 3. process each used part bus and feed its sends from the tap snapshots
//! 4. process aux busses in index order (an aux may send to later ones)
//! 5. route part and aux outputs to the main bus or a dedicated output
//! 6. process the main bus into output 0
//!
//! The order makes send cycles impossible and means every aux bus sees part
//! signal from the block being computed.

use crate::bus::{Bus, BusAddress};
use crate::group::Group;
use crate::part::Part;
use crate::pool::{NoteTrigger, StartOutcome, VoicePool};
use crate::voice::NoteStart;
use mosaic_core::{SampleRateContext, StereoBlock, MAX_OUTPUTS, NUM_AUX_BUSSES, NUM_PARTS};

pub type OutputBuffers = [StereoBlock; MAX_OUTPUTS];

/// Note-on as seen by the patch.
#[derive(Debug, Clone, Copy)]
pub struct NoteOn {
    pub channel: i16,
    pub key: u8,
    pub note_id: i32,
    /// 0-1
    pub velocity: f32,
    /// Semitones
    pub detune: f32,
}

#[derive(Debug)]
pub struct Patch {
    parts: [Part; NUM_PARTS],
    part_busses: [Bus; NUM_PARTS],
    aux_busses: [Bus; NUM_AUX_BUSSES],
    main: Bus,
    note_counter: u32,
}

impl Patch {
    pub fn new(context: SampleRateContext) -> Self {
        let sample_rate = context.sample_rate() as f32;
        Self {
            parts: std::array::from_fn(|_| Part::new(context)),
            part_busses: std::array::from_fn(|i| Bus::new(BusAddress::Part(i as u8), sample_rate)),
            aux_busses: std::array::from_fn(|i| Bus::new(BusAddress::Aux(i as u8), sample_rate)),
            main: Bus::new(BusAddress::Main, sample_rate),
            note_counter: 0,
        }
    }

    pub fn part(&self, index: usize) -> Option<&Part> {
        self.parts.get(index)
    }

    pub fn part_mut(&mut self, index: usize) -> Option<&mut Part> {
        self.parts.get_mut(index)
    }

    pub fn group(&self, part: usize, group: usize) -> Option<&Group> {
        self.parts.get(part)?.groups.get(group)
    }

    pub fn group_mut(&mut self, part: usize, group: usize) -> Option<&mut Group> {
        self.parts.get_mut(part)?.groups.get_mut(group)
    }

    pub fn bus(&self, address: BusAddress) -> Option<&Bus> {
        match address {
            BusAddress::Main => Some(&self.main),
            BusAddress::Part(i) => self.part_busses.get(i as usize),
            BusAddress::Aux(i) => self.aux_busses.get(i as usize),
        }
    }

    pub fn bus_mut(&mut self, address: BusAddress) -> Option<&mut Bus> {
        match address {
            BusAddress::Main => Some(&mut self.main),
            BusAddress::Part(i) => self.part_busses.get_mut(i as usize),
            BusAddress::Aux(i) => self.aux_busses.get_mut(i as usize),
        }
    }

    /// Start a voice for every zone matching the note in every part that
    /// accepts its channel. Returns the number of voices started.
    pub fn note_on(&mut self, voices: &mut VoicePool, note: NoteOn) -> usize {
        let velocity = note.velocity.clamp(0.0, 1.0);
        let velocity_7bit = (velocity * 127.0).round() as u8;
        let trigger = NoteTrigger::new(note.channel, note.key, note.note_id);
        let mut started = 0;

        for part_index in 0..NUM_PARTS {
            let part = &self.parts[part_index];
            if !part.accepts(note.channel) {
                continue;
            }
            let Some(key) = part.map_key(note.key) else {
                continue;
            };

            for group_index in 0..part.groups.len() {
                for zone_index in 0..self.parts[part_index].groups[group_index].zones.len() {
                    let zone = &self.parts[part_index].groups[group_index].zones[zone_index];
                    if !zone.matches(key, velocity_7bit) {
                        continue;
                    }
                    let Some(sample) = zone.sample() else {
                        continue;
                    };
                    self.note_counter = self.note_counter.wrapping_add(1);
                    let start = NoteStart {
                        part: part_index,
                        group: group_index,
                        key,
                        velocity,
                        detune: note.detune,
                        crossfade: zone.crossfade_gain(key, velocity_7bit),
                        seed: self.note_counter.wrapping_mul(0x9E37_79B9) ^ key as u32,
                    };

                    match voices.start(&zone.data, sample, trigger, start) {
                        StartOutcome::Started { .. } => {}
                        StartOutcome::Stole { part, group, .. } => {
                            if let Some(g) = self.group_mut(part, group) {
                                g.voice_finished();
                            }
                        }
                        StartOutcome::Dropped => continue,
                    }
                    self.parts[part_index].groups[group_index].voice_started();
                    started += 1;
                }
            }
        }
        started
    }

    /// Fade out every voice and reset group bookkeeping.
    pub fn panic(&mut self, voices: &mut VoicePool) {
        voices.panic();
        for part in self.parts.iter_mut() {
            for group in part.groups.iter_mut() {
                group.clear_voices();
            }
        }
    }

    /// Render one block into `outputs`, which the caller has zeroed.
    pub fn process(&mut self, voices: &mut VoicePool, outputs: &mut OutputBuffers) {
        // 1. clear
        self.main.clear();
        for bus in self.part_busses.iter_mut().chain(self.aux_busses.iter_mut()) {
            bus.clear();
        }

        // 2. parts into part busses
        for (index, (part, bus)) in self.parts.iter_mut().zip(self.part_busses.iter_mut()).enumerate() {
            let mut block = [[0.0; mosaic_core::BLOCK_SIZE]; 2];
            if part.process(index, voices, &mut block) {
                bus.accumulate(&block);
            }
        }

        // 3. part busses: effects, VCA, sends in the same pass
        for bus in self.part_busses.iter_mut() {
            if !bus.process() {
                continue;
            }
            feed_sends(bus, &mut self.aux_busses);
        }

        // 4. aux busses, each may feed later ones
        for index in 0..NUM_AUX_BUSSES {
            let (head, tail) = self.aux_busses.split_at_mut(index + 1);
            let bus = &mut head[index];
            if !bus.process() {
                continue;
            }
            for send_index in (index + 1)..NUM_AUX_BUSSES {
                let send = bus.settings().sends[send_index];
                if send.level > 0.0 {
                    let target = &mut tail[send_index - index - 1];
                    target.accumulate_scaled(bus.tap(send.tap), send.level);
                    target.note_upstream_tail(bus.remaining_tail());
                }
            }
        }

        // 5. output routing
        for bus in self.part_busses.iter().chain(self.aux_busses.iter()) {
            if !bus.is_active() {
                continue;
            }
            route(bus, &mut self.main, outputs);
        }

        // 6. main bus
        if self.main.process() {
            add_block(&mut outputs[0], self.main.output());
        }
    }

    /// Samples until every bus in the patch has gone silent, as seen by the
    /// main bus at the end of the last block.
    pub fn tail_samples(&self) -> usize {
        self.main.remaining_tail()
    }

    /// Groups with at least one sounding voice.
    pub fn sounding_groups(&self) -> usize {
        self.parts
            .iter()
            .flat_map(|p| p.groups.iter())
            .filter(|g| g.voice_count() > 0)
            .count()
    }
}

fn feed_sends(bus: &Bus, aux: &mut [Bus; NUM_AUX_BUSSES]) {
    if !bus.address().supports_sends() {
        return;
    }
    for (send, target) in bus.settings().sends.iter().zip(aux.iter_mut()) {
        if send.level > 0.0 {
            target.accumulate_scaled(bus.tap(send.tap), send.level);
            target.note_upstream_tail(bus.remaining_tail());
        }
    }
}

/// Output index 0 is the main bus; 1.. are dedicated outputs. Anything out
/// of range falls back to main.
fn route(bus: &Bus, main: &mut Bus, outputs: &mut OutputBuffers) {
    match bus.settings().output as usize {
        n if n > 0 && n < MAX_OUTPUTS => add_block(&mut outputs[n], bus.output()),
        _ => {
            main.accumulate(bus.output());
            main.note_upstream_tail(bus.remaining_tail());
        }
    }
}

#[inline]
fn add_block(dest: &mut StereoBlock, src: &StereoBlock) {
    for (d, s) in dest.iter_mut().zip(src.iter()) {
        for (a, b) in d.iter_mut().zip(s.iter()) {
            *a += *b;
        }
    }
}
