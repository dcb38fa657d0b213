//! Parts: a MIDI-addressable set of groups feeding one part bus.

use crate::group::Group;
use crate::pool::VoicePool;
use mosaic_core::{SampleRateContext, StereoBlock, GROUPS_PER_PART};
use serde::{Deserialize, Serialize};

/// Which note channel a part answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PartChannel {
    #[default]
    Omni,
    Channel(u8),
}

impl PartChannel {
    /// `channel < 0` is "unspecified" and reaches every part.
    #[inline]
    pub fn accepts(&self, channel: i16) -> bool {
        match *self {
            PartChannel::Omni => true,
            PartChannel::Channel(ch) => channel < 0 || ch as i16 == channel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartSettings {
    pub enabled: bool,
    pub channel: PartChannel,
    /// Semitones added to incoming keys
    pub transpose: i8,
}

impl Default for PartSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            channel: PartChannel::Omni,
            transpose: 0,
        }
    }
}

#[derive(Debug)]
pub struct Part {
    pub settings: PartSettings,
    pub groups: [Group; GROUPS_PER_PART],
}

impl Part {
    pub fn new(context: SampleRateContext) -> Self {
        Self {
            settings: PartSettings::default(),
            groups: std::array::from_fn(|_| Group::new(context)),
        }
    }

    #[inline]
    pub fn accepts(&self, channel: i16) -> bool {
        self.settings.enabled && self.settings.channel.accepts(channel)
    }

    /// Key after transposition, or `None` if it leaves the MIDI range.
    #[inline]
    pub fn map_key(&self, key: u8) -> Option<u8> {
        let key = key as i16 + self.settings.transpose as i16;
        (0..=127).contains(&key).then_some(key as u8)
    }

    /// Does anything in this part need rendering this block?
    pub fn is_sounding(&self) -> bool {
        self.groups.iter().any(|g| g.voice_count() > 0)
    }

    /// Run the part's groups and voices and mix them into `bus`.
    /// Returns `true` if anything was written.
    pub fn process(&mut self, index: usize, voices: &mut VoicePool, bus: &mut StereoBlock) -> bool {
        for group in self.groups.iter_mut() {
            group.begin_block();
        }

        let groups = &mut self.groups;
        voices.drain_tails(index, |tail| {
            if let Some(group) = groups.get_mut(tail.group) {
                group.accumulate(&tail.block);
            }
        });

        let lfos: [_; GROUPS_PER_PART] = std::array::from_fn(|g| groups[g].lfo_values());
        let mut finished = [0usize; GROUPS_PER_PART];
        voices.render_part(
            index,
            |g| lfos.get(g).copied().unwrap_or_default(),
            |g, block| {
                if let Some(group) = groups.get_mut(g) {
                    group.accumulate(block);
                }
            },
            |g| {
                if let Some(count) = finished.get_mut(g) {
                    *count += 1;
                }
            },
        );
        for (group, count) in groups.iter_mut().zip(finished) {
            for _ in 0..count {
                group.voice_finished();
            }
        }

        let mut written = false;
        for group in groups.iter() {
            written |= group.mix_into(bus);
        }
        written
    }
}
