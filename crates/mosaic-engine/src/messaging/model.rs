//! Serialization-side copy of the patch's authoring data.
//!
//! The model is the source of truth for edits: handlers change it, then
//! build the replacement the audio thread swaps in.

use crate::bus::{BusAddress, BusEffectSpec, BusSettings};
use crate::group::GroupSettings;
use crate::messaging::protocol::{GroupSummary, PartSummary, ZoneSpec};
use crate::part::PartSettings;
use crate::zone::{SampleRef, Zone, ZoneData};
use crate::{Error, Result};
use mosaic_core::{
    Sample, SampleManager, GROUPS_PER_PART, MAX_BUS_EFFECTS, MAX_OUTPUTS, NUM_AUX_BUSSES, NUM_PARTS,
};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ZoneEntry {
    pub data: ZoneData,
    pub source: SampleRef,
    pub sample: Arc<Sample>,
}

impl ZoneEntry {
    pub fn to_zone(&self) -> Zone {
        Zone::new(self.data, Some(Arc::clone(&self.sample)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroupModel {
    pub zones: Vec<ZoneEntry>,
    pub settings: GroupSettings,
}

#[derive(Debug, Clone, Default)]
pub struct PartModel {
    pub settings: PartSettings,
    pub groups: Vec<GroupModel>,
}

#[derive(Debug, Clone, Default)]
pub struct BusModel {
    pub settings: BusSettings,
    pub effects: [Option<BusEffectSpec>; MAX_BUS_EFFECTS],
}

#[derive(Debug, Clone)]
pub struct PatchModel {
    parts: Vec<PartModel>,
    busses: HashMap<BusAddress, BusModel>,
}

impl Default for PatchModel {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchModel {
    pub fn new() -> Self {
        let parts = (0..NUM_PARTS)
            .map(|_| PartModel {
                settings: PartSettings::default(),
                groups: vec![GroupModel::default(); GROUPS_PER_PART],
            })
            .collect();
        let busses = std::iter::once(BusAddress::Main)
            .chain((0..NUM_PARTS).map(|i| BusAddress::Part(i as u8)))
            .chain((0..NUM_AUX_BUSSES).map(|i| BusAddress::Aux(i as u8)))
            .map(|address| (address, BusModel::default()))
            .collect();
        Self { parts, busses }
    }

    pub fn part(&self, part: usize) -> Result<&PartModel> {
        self.parts.get(part).ok_or(Error::InvalidPart(part))
    }

    pub fn part_mut(&mut self, part: usize) -> Result<&mut PartModel> {
        self.parts.get_mut(part).ok_or(Error::InvalidPart(part))
    }

    pub fn group(&self, part: usize, group: usize) -> Result<&GroupModel> {
        self.part(part)?
            .groups
            .get(group)
            .ok_or(Error::InvalidGroup { part, group })
    }

    pub fn group_mut(&mut self, part: usize, group: usize) -> Result<&mut GroupModel> {
        self.part_mut(part)?
            .groups
            .get_mut(group)
            .ok_or(Error::InvalidGroup { part, group })
    }

    pub fn zone_mut(&mut self, part: usize, group: usize, zone: usize) -> Result<&mut ZoneEntry> {
        self.group_mut(part, group)?
            .zones
            .get_mut(zone)
            .ok_or(Error::InvalidZone { part, group, zone })
    }

    pub fn bus(&self, address: BusAddress) -> Result<&BusModel> {
        self.busses
            .get(&address)
            .ok_or_else(|| Error::InvalidBus(address.to_string()))
    }

    pub fn bus_mut(&mut self, address: BusAddress) -> Result<&mut BusModel> {
        self.busses
            .get_mut(&address)
            .ok_or_else(|| Error::InvalidBus(address.to_string()))
    }

    /// Resolve a client zone against the sample store and append it.
    /// Returns the new zone count of the group.
    pub fn add_zone(
        &mut self,
        part: usize,
        group: usize,
        spec: ZoneSpec,
        samples: &SampleManager,
    ) -> Result<usize> {
        spec.data.validate()?;
        let sample = resolve_sample(&spec.sample, samples)?;
        let target = self.group_mut(part, group)?;
        target.zones.push(ZoneEntry {
            data: spec.data,
            source: spec.sample,
            sample,
        });
        Ok(target.zones.len())
    }

    /// Replace a zone's authoring data, keeping its sample.
    pub fn update_zone(&mut self, part: usize, group: usize, zone: usize, data: ZoneData) -> Result<()> {
        data.validate()?;
        self.zone_mut(part, group, zone)?.data = data;
        Ok(())
    }

    pub fn remove_zone(&mut self, part: usize, group: usize, zone: usize) -> Result<ZoneEntry> {
        let target = self.group_mut(part, group)?;
        if zone >= target.zones.len() {
            return Err(Error::InvalidZone { part, group, zone });
        }
        Ok(target.zones.remove(zone))
    }

    pub fn set_group_settings(
        &mut self,
        part: usize,
        group: usize,
        mut settings: GroupSettings,
    ) -> Result<GroupSettings> {
        if !settings.volume_db.is_finite() || !settings.pan.is_finite() {
            return Err(Error::InvalidParameter(
                "group level and pan must be finite".into(),
            ));
        }
        settings.pan = settings.pan.clamp(-1.0, 1.0);
        self.group_mut(part, group)?.settings = settings;
        Ok(settings)
    }

    pub fn set_bus_settings(&mut self, address: BusAddress, settings: BusSettings) -> Result<()> {
        self.bus(address)?;
        if settings.output as usize >= MAX_OUTPUTS {
            return Err(Error::InvalidOutput(settings.output));
        }
        if !settings.level_db.is_finite() || !settings.pan.is_finite() {
            return Err(Error::InvalidParameter("bus level and pan must be finite".into()));
        }
        if !address.supports_sends() && settings.sends.iter().any(|s| s.level > 0.0) {
            return Err(Error::InvalidParameter(format!("{address} has no sends")));
        }
        if let BusAddress::Aux(index) = address {
            // Aux busses only feed later aux busses
            let backwards = settings.sends[..=index as usize].iter().any(|s| s.level > 0.0);
            if backwards {
                return Err(Error::InvalidParameter(format!(
                    "{address} may only send to aux busses after it"
                )));
            }
        }
        self.bus_mut(address)?.settings = settings;
        Ok(())
    }

    pub fn set_bus_effect(
        &mut self,
        address: BusAddress,
        slot: usize,
        effect: Option<BusEffectSpec>,
    ) -> Result<()> {
        if let Some(spec) = &effect {
            spec.validate()?;
        }
        let target = self
            .bus_mut(address)?
            .effects
            .get_mut(slot)
            .ok_or(Error::InvalidEffectSlot(slot))?;
        *target = effect;
        Ok(())
    }

    /// The runtime zone list the audio thread should hold for a group.
    pub fn build_zones(&self, part: usize, group: usize) -> Result<Vec<Zone>> {
        Ok(self
            .group(part, group)?
            .zones
            .iter()
            .map(ZoneEntry::to_zone)
            .collect())
    }

    pub fn summary(&self) -> Vec<PartSummary> {
        self.parts
            .iter()
            .enumerate()
            .map(|(index, part)| PartSummary {
                index: index as u8,
                enabled: part.settings.enabled,
                channel: part.settings.channel,
                groups: part
                    .groups
                    .iter()
                    .enumerate()
                    .filter(|(_, g)| !g.zones.is_empty())
                    .map(|(index, g)| GroupSummary {
                        index: index as u8,
                        zones: g.zones.len() as u32,
                        volume_db: g.settings.volume_db,
                        mute: g.settings.mute,
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn zone_count(&self) -> usize {
        self.parts
            .iter()
            .flat_map(|p| p.groups.iter())
            .map(|g| g.zones.len())
            .sum()
    }
}

/// Look up (loading if needed) the sample a zone refers to.
pub fn resolve_sample(source: &SampleRef, samples: &SampleManager) -> Result<Arc<Sample>> {
    let id = match source {
        SampleRef::Id(id) => *id,
        SampleRef::Path(path) => samples.try_load_sample_by_path(path)?,
    };
    samples
        .get(id)
        .ok_or_else(|| Error::SampleUnavailable(id.to_string()))
}
