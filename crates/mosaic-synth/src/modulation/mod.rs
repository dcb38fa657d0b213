//! Modulation ids, routing tables and the per-voice/per-group matrix.
//!
//! Sources and destinations are closed enums with contiguous discriminants,
//! so every id doubles as an array index. Raw ids coming off the wire are
//! checked through `TryFrom<u8>` before they can reach a routing table.

mod matrix;

pub use matrix::ModulationMatrix;

use crate::{Error, Result};
use mosaic_core::MAX_ROUTING_ENTRIES;
use serde::{Deserialize, Serialize};

/// Modulation source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ModSource {
    /// Inactive slot marker
    #[default]
    None = 0,
    /// Amplitude envelope (0.0-1.0)
    AmpEnv,
    /// Second envelope (0.0-1.0)
    Env2,
    Lfo1,
    Lfo2,
    Lfo3,
    /// Note-on velocity (0.0-1.0)
    Velocity,
    /// Note-off velocity, zero until release
    ReleaseVelocity,
    /// Key relative to middle C in octaves (key 72 = 1.0)
    KeyTrack,
    /// Fixed random value per note (0.0-1.0)
    Random,
    GroupLfo1,
    GroupLfo2,
}

impl ModSource {
    pub const COUNT: usize = 12;

    pub const ALL: [ModSource; Self::COUNT] = [
        ModSource::None,
        ModSource::AmpEnv,
        ModSource::Env2,
        ModSource::Lfo1,
        ModSource::Lfo2,
        ModSource::Lfo3,
        ModSource::Velocity,
        ModSource::ReleaseVelocity,
        ModSource::KeyTrack,
        ModSource::Random,
        ModSource::GroupLfo1,
        ModSource::GroupLfo2,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ModSource::None => "None",
            ModSource::AmpEnv => "Amp EG",
            ModSource::Env2 => "EG 2",
            ModSource::Lfo1 => "LFO 1",
            ModSource::Lfo2 => "LFO 2",
            ModSource::Lfo3 => "LFO 3",
            ModSource::Velocity => "Velocity",
            ModSource::ReleaseVelocity => "Release Velocity",
            ModSource::KeyTrack => "Keytrack",
            ModSource::Random => "Random",
            ModSource::GroupLfo1 => "Group LFO 1",
            ModSource::GroupLfo2 => "Group LFO 2",
        }
    }
}

impl TryFrom<u8> for ModSource {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(Error::InvalidSource(value))
    }
}

/// Modulation destination.
///
/// Units follow the baseline they are added to: `Volume` and `GroupVolume`
/// are decibels, `Pitch` is semitones, rates are octaves, everything else is
/// the processor's normalized parameter space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ModDest {
    /// Inactive slot marker
    #[default]
    None = 0,
    Volume,
    Pan,
    Pitch,
    Processor1Mix,
    Processor1Param1,
    Processor1Param2,
    Processor2Mix,
    Processor2Param1,
    Processor2Param2,
    Lfo1Rate,
    Lfo2Rate,
    Lfo3Rate,
    AmpEnvRate,
    Env2Rate,
    AmpEnvRetrigger,
    Env2Retrigger,
    GroupVolume,
    GroupPan,
    GroupLfo1Rate,
    GroupLfo2Rate,
}

impl ModDest {
    pub const COUNT: usize = 21;

    pub const ALL: [ModDest; Self::COUNT] = [
        ModDest::None,
        ModDest::Volume,
        ModDest::Pan,
        ModDest::Pitch,
        ModDest::Processor1Mix,
        ModDest::Processor1Param1,
        ModDest::Processor1Param2,
        ModDest::Processor2Mix,
        ModDest::Processor2Param1,
        ModDest::Processor2Param2,
        ModDest::Lfo1Rate,
        ModDest::Lfo2Rate,
        ModDest::Lfo3Rate,
        ModDest::AmpEnvRate,
        ModDest::Env2Rate,
        ModDest::AmpEnvRetrigger,
        ModDest::Env2Retrigger,
        ModDest::GroupVolume,
        ModDest::GroupPan,
        ModDest::GroupLfo1Rate,
        ModDest::GroupLfo2Rate,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Mix destination of processor slot `slot`.
    pub fn processor_mix(slot: usize) -> ModDest {
        match slot {
            0 => ModDest::Processor1Mix,
            1 => ModDest::Processor2Mix,
            _ => ModDest::None,
        }
    }

    /// Parameter `param` (0 or 1) of processor slot `slot`.
    pub fn processor_param(slot: usize, param: usize) -> ModDest {
        match (slot, param) {
            (0, 0) => ModDest::Processor1Param1,
            (0, 1) => ModDest::Processor1Param2,
            (1, 0) => ModDest::Processor2Param1,
            (1, 1) => ModDest::Processor2Param2,
            _ => ModDest::None,
        }
    }

    pub fn lfo_rate(slot: usize) -> ModDest {
        match slot {
            0 => ModDest::Lfo1Rate,
            1 => ModDest::Lfo2Rate,
            2 => ModDest::Lfo3Rate,
            _ => ModDest::None,
        }
    }

    pub fn group_lfo_rate(slot: usize) -> ModDest {
        match slot {
            0 => ModDest::GroupLfo1Rate,
            1 => ModDest::GroupLfo2Rate,
            _ => ModDest::None,
        }
    }
}

impl TryFrom<u8> for ModDest {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(Error::InvalidDestination(value))
    }
}

/// One row of a routing table.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RoutingEntry {
    pub source: ModSource,
    pub destination: ModDest,
    /// Scale applied to the source value, in destination units
    pub depth: f32,
}

impl RoutingEntry {
    pub fn new(source: ModSource, destination: ModDest, depth: f32) -> Self {
        Self {
            source,
            destination,
            depth,
        }
    }

    /// Slots with either end unset are skipped during evaluation.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.source != ModSource::None && self.destination != ModDest::None
    }
}

/// Routing entry as it arrives from a client, with unchecked ids.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawRoute {
    pub source: u8,
    pub destination: u8,
    pub depth: f32,
}

impl TryFrom<RawRoute> for RoutingEntry {
    type Error = Error;

    fn try_from(raw: RawRoute) -> Result<Self> {
        if !raw.depth.is_finite() {
            return Err(Error::InvalidDepth(raw.depth));
        }
        Ok(Self {
            source: ModSource::try_from(raw.source)?,
            destination: ModDest::try_from(raw.destination)?,
            depth: raw.depth,
        })
    }
}

impl From<RoutingEntry> for RawRoute {
    fn from(entry: RoutingEntry) -> Self {
        Self {
            source: entry.source as u8,
            destination: entry.destination as u8,
            depth: entry.depth,
        }
    }
}

/// Fixed-size routing table owned by a zone or group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutingTable {
    entries: [RoutingEntry; MAX_ROUTING_ENTRIES],
}

impl RoutingTable {
    pub fn new() -> Self {
        Self {
            entries: [RoutingEntry::default(); MAX_ROUTING_ENTRIES],
        }
    }

    /// Overwrite slot `slot`.
    pub fn set(&mut self, slot: usize, entry: RoutingEntry) -> Result<()> {
        let target = self.entries.get_mut(slot).ok_or(Error::InvalidSlot(slot))?;
        *target = entry;
        Ok(())
    }

    /// Put `entry` in the first inactive slot. Returns the slot index, or
    /// `None` if the table is full.
    pub fn add(&mut self, entry: RoutingEntry) -> Option<usize> {
        let slot = self.entries.iter().position(|e| !e.is_active())?;
        self.entries[slot] = entry;
        Some(slot)
    }

    pub fn clear_slot(&mut self, slot: usize) -> Result<()> {
        self.set(slot, RoutingEntry::default())
    }

    pub fn set_depth(&mut self, slot: usize, depth: f32) -> Result<()> {
        let target = self.entries.get_mut(slot).ok_or(Error::InvalidSlot(slot))?;
        target.depth = depth;
        Ok(())
    }

    pub fn get(&self, slot: usize) -> Option<&RoutingEntry> {
        self.entries.get(slot)
    }

    pub fn entries(&self) -> &[RoutingEntry; MAX_ROUTING_ENTRIES] {
        &self.entries
    }

    pub fn active(&self) -> impl Iterator<Item = &RoutingEntry> {
        self.entries.iter().filter(|e| e.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    pub fn clear(&mut self) {
        self.entries = [RoutingEntry::default(); MAX_ROUTING_ENTRIES];
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new()
    }
}

/// One float per destination, indexed by [`ModDest`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DestValues {
    values: [f32; ModDest::COUNT],
}

impl DestValues {
    pub const fn zeroed() -> Self {
        Self {
            values: [0.0; ModDest::COUNT],
        }
    }

    #[inline]
    pub fn get(&self, dest: ModDest) -> f32 {
        self.values[dest.index()]
    }

    #[inline]
    pub fn set(&mut self, dest: ModDest, value: f32) {
        self.values[dest.index()] = value;
    }

    #[inline]
    pub fn add(&mut self, dest: ModDest, value: f32) {
        self.values[dest.index()] += value;
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}

impl Default for DestValues {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Where an owner publishes each source it provides.
///
/// Maps a source id to an index in the owner's live value slice. Sources
/// without a slot read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLayout {
    slots: [Option<u8>; ModSource::COUNT],
}

impl SourceLayout {
    pub const fn empty() -> Self {
        Self {
            slots: [None; ModSource::COUNT],
        }
    }

    /// Declare that `source` lives at `index` in the owner's value slice.
    pub fn with(mut self, source: ModSource, index: u8) -> Self {
        self.slots[source as usize] = Some(index);
        self
    }

    #[inline]
    pub fn slot(&self, source: ModSource) -> Option<usize> {
        self.slots[source.index()].map(usize::from)
    }

    /// Number of live values the owner must provide.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .map(|&i| i as usize + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self::empty()
    }
}
