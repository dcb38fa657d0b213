//! Zones: one sample mapped over a key and velocity window, plus everything a
//! voice needs to play it.

use crate::processor::ProcessorStorage;
use crate::{Error, Result};
use mosaic_core::instrument::Tracked;
use mosaic_core::{Sample, SampleId, ENVELOPES_PER_ZONE, LFOS_PER_ZONE, PROCESSORS_PER_ZONE};
use mosaic_synth::{DestValues, EnvelopeStorage, ModDest, ModulatorStorage, RoutingTable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Inclusive MIDI range with linear fades at either edge.
///
/// `fade_low` keys (or velocities) above `low` ramp in from silence;
/// `fade_high` below `high` ramp out. Zero-width fades are hard edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiRange {
    pub low: u8,
    pub high: u8,
    pub fade_low: u8,
    pub fade_high: u8,
}

impl MidiRange {
    pub const FULL: MidiRange = MidiRange {
        low: 0,
        high: 127,
        fade_low: 0,
        fade_high: 0,
    };

    pub fn new(low: u8, high: u8) -> Self {
        Self {
            low,
            high,
            fade_low: 0,
            fade_high: 0,
        }
    }

    pub fn with_fades(mut self, fade_low: u8, fade_high: u8) -> Self {
        self.fade_low = fade_low;
        self.fade_high = fade_high;
        self
    }

    #[inline]
    pub fn contains(&self, value: u8) -> bool {
        (self.low..=self.high).contains(&value)
    }

    /// Crossfade gain at `value`, 0 outside the range.
    pub fn gain(&self, value: u8) -> f32 {
        if !self.contains(value) {
            return 0.0;
        }
        let mut gain = 1.0;
        if self.fade_low > 0 {
            let into = (value - self.low) as f32 + 1.0;
            gain *= (into / (self.fade_low as f32 + 1.0)).min(1.0);
        }
        if self.fade_high > 0 {
            let into = (self.high - value) as f32 + 1.0;
            gain *= (into / (self.fade_high as f32 + 1.0)).min(1.0);
        }
        gain
    }
}

impl Default for MidiRange {
    fn default() -> Self {
        Self::FULL
    }
}

/// How note-off affects the voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayMode {
    /// Note-off releases the envelopes; the voice ends when the amp envelope does
    #[default]
    Gated,
    /// Note-off is ignored; the voice ends with the sample
    OneShot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoopMode {
    /// Play once to the end
    #[default]
    Off,
    /// Loop between the loop points for as long as the voice lives
    Forward,
    /// Loop while the key is held, then play through to the end
    UntilRelease,
}

/// Sample region and loop points, in frames. Zero `end`s mean "sample end".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SampleRegion {
    pub start: u32,
    pub end: u32,
    pub loop_mode: LoopMode,
    pub loop_start: u32,
    pub loop_end: u32,
}

/// Authoring data of a zone. Plain values only; a voice copies it at note-on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneData {
    pub keys: MidiRange,
    pub velocities: MidiRange,
    pub root_key: u8,
    /// Semitones
    pub tune: f32,
    /// Decibels
    pub volume_db: f32,
    /// -1 (left) to 1 (right)
    pub pan: f32,
    /// 0 ignores velocity, 1 scales amplitude by it
    pub velocity_tracking: f32,
    pub play_mode: PlayMode,
    pub region: SampleRegion,
    pub processors: [ProcessorStorage; PROCESSORS_PER_ZONE],
    /// `[amp envelope, envelope 2]`
    pub envelopes: [EnvelopeStorage; ENVELOPES_PER_ZONE],
    pub lfos: [ModulatorStorage; LFOS_PER_ZONE],
    pub routing: RoutingTable,
}

impl Default for ZoneData {
    fn default() -> Self {
        Self {
            keys: MidiRange::FULL,
            velocities: MidiRange::FULL,
            root_key: 60,
            tune: 0.0,
            volume_db: 0.0,
            pan: 0.0,
            velocity_tracking: 1.0,
            play_mode: PlayMode::Gated,
            region: SampleRegion::default(),
            processors: [ProcessorStorage::default(); PROCESSORS_PER_ZONE],
            envelopes: [EnvelopeStorage::default(); ENVELOPES_PER_ZONE],
            lfos: [ModulatorStorage::default(); LFOS_PER_ZONE],
            routing: RoutingTable::new(),
        }
    }
}

impl ZoneData {
    /// Destination baselines the voice matrix starts from.
    pub fn base_values(&self) -> DestValues {
        let mut base = DestValues::zeroed();
        base.set(ModDest::Volume, self.volume_db);
        base.set(ModDest::Pan, self.pan);
        base.set(ModDest::Pitch, self.tune);
        for (slot, processor) in self.processors.iter().enumerate() {
            base.set(ModDest::processor_mix(slot), processor.mix);
            base.set(ModDest::processor_param(slot, 0), processor.params[0]);
            base.set(ModDest::processor_param(slot, 1), processor.params[1]);
        }
        base
    }

    /// Every continuous parameter must be finite before the zone reaches a
    /// voice; routing entries are checked when they are built.
    pub fn validate(&self) -> Result<()> {
        let levels = [self.tune, self.volume_db, self.pan, self.velocity_tracking];
        if !all_finite(&levels) {
            return Err(invalid("zone tune, volume, pan and velocity tracking"));
        }
        for (slot, processor) in self.processors.iter().enumerate() {
            if !processor.mix.is_finite() || !all_finite(&processor.params) {
                return Err(invalid(&format!("processor {slot}")));
            }
        }
        for (index, env) in self.envelopes.iter().enumerate() {
            let values = [
                env.delay,
                env.attack,
                env.hold,
                env.decay,
                env.sustain,
                env.release,
                env.attack_shape,
                env.decay_shape,
                env.release_shape,
            ];
            if !all_finite(&values) {
                return Err(invalid(&format!("envelope {index}")));
            }
        }
        for (index, lfo) in self.lfos.iter().enumerate() {
            if !lfo.rate.is_finite() || !lfo.phase_offset.is_finite() {
                return Err(invalid(&format!("lfo {index}")));
            }
        }
        Ok(())
    }
}

fn all_finite(values: &[f32]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn invalid(what: &str) -> Error {
    Error::InvalidParameter(format!("{what} parameters must be finite"))
}

/// Where a zone's sample comes from in a client request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SampleRef {
    Id(SampleId),
    Path(PathBuf),
}

/// A zone as stored in a group: authoring data plus the resolved sample.
#[derive(Debug, Clone)]
pub struct Zone {
    pub data: ZoneData,
    sample: Option<Arc<Sample>>,
    _tracked: Tracked,
}

impl Zone {
    pub fn new(data: ZoneData, sample: Option<Arc<Sample>>) -> Self {
        Self {
            data,
            sample,
            _tracked: Tracked::new("Zone"),
        }
    }

    pub fn with_sample(sample: Arc<Sample>) -> Self {
        Self::new(ZoneData::default(), Some(sample))
    }

    pub fn sample(&self) -> Option<&Arc<Sample>> {
        self.sample.as_ref()
    }

    pub fn set_sample(&mut self, sample: Option<Arc<Sample>>) {
        self.sample = sample;
    }

    /// Does a note at `key` / `velocity` (0-127) trigger this zone?
    #[inline]
    pub fn matches(&self, key: u8, velocity: u8) -> bool {
        self.sample.is_some() && self.data.keys.contains(key) && self.data.velocities.contains(velocity)
    }

    /// Key and velocity crossfade gain.
    #[inline]
    pub fn crossfade_gain(&self, key: u8, velocity: u8) -> f32 {
        self.data.keys.gain(key) * self.data.velocities.gain(velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> Zone {
        Zone::with_sample(Arc::new(Sample::mono(48000.0, vec![0.0; 8])))
    }

    #[test]
    fn test_matches_key_and_velocity() {
        let mut zone = zone();
        zone.data.keys = MidiRange::new(48, 59);
        zone.data.velocities = MidiRange::new(64, 127);
        assert!(zone.matches(48, 100));
        assert!(zone.matches(59, 64));
        assert!(!zone.matches(60, 100));
        assert!(!zone.matches(50, 63));
    }

    #[test]
    fn test_zone_without_sample_never_matches() {
        let zone = Zone::new(ZoneData::default(), None);
        assert!(!zone.matches(60, 100));
    }

    #[test]
    fn test_range_fades() {
        let range = MidiRange::new(60, 71).with_fades(3, 0);
        assert!((range.gain(60) - 0.25).abs() < 1e-6);
        assert!((range.gain(62) - 0.75).abs() < 1e-6);
        assert_eq!(range.gain(63), 1.0);
        assert_eq!(range.gain(71), 1.0);
        assert_eq!(range.gain(72), 0.0);

        let range = MidiRange::new(0, 10).with_fades(0, 1);
        assert!((range.gain(10) - 0.5).abs() < 1e-6);
        assert_eq!(range.gain(9), 1.0);
    }

    #[test]
    fn test_base_values_carry_zone_settings() {
        let mut data = ZoneData {
            volume_db: -6.0,
            pan: 0.5,
            tune: 2.0,
            ..ZoneData::default()
        };
        data.processors[1].mix = 0.25;
        data.processors[1].params = [12.0, 0.3];

        let base = data.base_values();
        assert_eq!(base.get(ModDest::Volume), -6.0);
        assert_eq!(base.get(ModDest::Pan), 0.5);
        assert_eq!(base.get(ModDest::Pitch), 2.0);
        assert_eq!(base.get(ModDest::Processor2Mix), 0.25);
        assert_eq!(base.get(ModDest::Processor2Param1), 12.0);
        assert_eq!(base.get(ModDest::Processor2Param2), 0.3);
    }

    #[test]
    fn test_validate_rejects_non_finite_values() {
        assert!(ZoneData::default().validate().is_ok());

        let cases: [fn(&mut ZoneData); 5] = [
            |d| d.volume_db = f32::NAN,
            |d| d.pan = f32::INFINITY,
            |d| d.processors[1].params[1] = f32::NAN,
            |d| d.envelopes[0].release = f32::NEG_INFINITY,
            |d| d.lfos[1].rate = f32::NAN,
        ];
        for (i, edit) in cases.iter().enumerate() {
            let mut data = ZoneData::default();
            edit(&mut data);
            assert!(
                matches!(data.validate(), Err(Error::InvalidParameter(_))),
                "case {i} accepted"
            );
        }
    }

    #[test]
    fn test_clone_shares_sample() {
        let zone = zone();
        let copy = zone.clone();
        assert!(Arc::ptr_eq(zone.sample().unwrap(), copy.sample().unwrap()));
    }
}
