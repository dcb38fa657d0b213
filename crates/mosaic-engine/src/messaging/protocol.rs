//! Client <-> serialization thread wire format.
//!
//! Client messages travel as a bincode-encoded [`Envelope`] whose `id`
//! selects the handler and whose `payload` is the bincode encoding of the
//! message struct. Replies are a bincode-encoded [`SerializationToClient`].

use crate::bus::{BusAddress, BusEffectSpec, BusSettings};
use crate::part::{PartChannel, PartSettings};
use crate::zone::{SampleRef, ZoneData};
use crate::Result;
use mosaic_core::SampleId;
use mosaic_synth::RawRoute;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Framing of every client -> serialization message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: u16,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// A typed client message with a fixed wire id.
pub trait ClientMessage: Serialize + DeserializeOwned {
    const ID: u16;

    fn to_envelope(&self) -> Result<Envelope> {
        Ok(Envelope {
            id: Self::ID,
            payload: bincode::serialize(self)?,
        })
    }

    fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(payload)?)
    }
}

/// Ids below this are reserved for built-in messages.
pub const CUSTOM_ID_BASE: u16 = 1000;

pub mod ids {
    pub const PING: u16 = 1;
    pub const REQUEST_STATUS: u16 = 2;
    pub const LOAD_SAMPLE: u16 = 3;
    pub const ADD_ZONE: u16 = 10;
    pub const REMOVE_ZONE: u16 = 11;
    pub const UPDATE_ZONE: u16 = 12;
    pub const SET_ZONE_ROUTING: u16 = 13;
    pub const SET_GROUP_ROUTING: u16 = 20;
    pub const SET_GROUP_OUTPUT: u16 = 21;
    pub const SET_PART: u16 = 30;
    pub const SET_BUS: u16 = 40;
    pub const SET_BUS_EFFECT: u16 = 41;
    pub const PANIC: u16 = 50;
    pub const REQUEST_PATCH_SUMMARY: u16 = 60;
}

macro_rules! client_message {
    ($ty:ty, $id:expr) => {
        impl ClientMessage for $ty {
            const ID: u16 = $id;
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    pub nonce: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSample {
    pub path: PathBuf,
}

/// A zone as sent by a client: authoring data plus a sample reference that
/// the serialization thread resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSpec {
    pub data: ZoneData,
    pub sample: SampleRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddZone {
    pub part: u8,
    pub group: u8,
    pub zone: ZoneSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveZone {
    pub part: u8,
    pub group: u8,
    pub zone: u32,
}

/// Replace a zone's authoring data, keeping its sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateZone {
    pub part: u8,
    pub group: u8,
    pub zone: u32,
    pub data: ZoneData,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetZoneRouting {
    pub part: u8,
    pub group: u8,
    pub zone: u32,
    pub slot: u8,
    pub route: RawRoute,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetGroupRouting {
    pub part: u8,
    pub group: u8,
    pub slot: u8,
    pub route: RawRoute,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetGroupOutput {
    pub part: u8,
    pub group: u8,
    pub volume_db: f32,
    pub pan: f32,
    pub mute: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPart {
    pub part: u8,
    pub settings: PartSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetBus {
    pub bus: BusAddress,
    pub settings: BusSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetBusEffect {
    pub bus: BusAddress,
    pub slot: u8,
    /// `None` clears the slot
    pub effect: Option<BusEffectSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Panic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPatchSummary;

client_message!(Ping, ids::PING);
client_message!(RequestStatus, ids::REQUEST_STATUS);
client_message!(LoadSample, ids::LOAD_SAMPLE);
client_message!(AddZone, ids::ADD_ZONE);
client_message!(RemoveZone, ids::REMOVE_ZONE);
client_message!(UpdateZone, ids::UPDATE_ZONE);
client_message!(SetZoneRouting, ids::SET_ZONE_ROUTING);
client_message!(SetGroupRouting, ids::SET_GROUP_ROUTING);
client_message!(SetGroupOutput, ids::SET_GROUP_OUTPUT);
client_message!(SetPart, ids::SET_PART);
client_message!(SetBus, ids::SET_BUS);
client_message!(SetBusEffect, ids::SET_BUS_EFFECT);
client_message!(Panic, ids::PANIC);
client_message!(RequestPatchSummary, ids::REQUEST_PATCH_SUMMARY);

/// What kind of audio-thread change was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    Zones,
    Group,
    Part,
    Bus,
    BusEffect,
    Panic,
    Callback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub index: u8,
    pub zones: u32,
    pub volume_db: f32,
    pub mute: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartSummary {
    pub index: u8,
    pub enabled: bool,
    pub channel: PartChannel,
    /// Groups holding at least one zone
    pub groups: Vec<GroupSummary>,
}

/// Replies delivered to the client callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SerializationToClient {
    Pong {
        nonce: u64,
    },
    Error {
        message: String,
    },
    Status {
        active_voices: u32,
        blocks_processed: u64,
        tail_samples: u64,
    },
    SampleLoaded {
        sample_id: SampleId,
        path: PathBuf,
    },
    ZonesChanged {
        part: u8,
        group: u8,
        zone_count: u32,
    },
    Applied {
        command: CommandKind,
    },
    PatchSummary {
        parts: Vec<PartSummary>,
    },
}

impl SerializationToClient {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SerializationToClient::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_envelope_carries_id() {
        let envelope = Ping { nonce: 7 }.to_envelope().unwrap();
        assert_eq!(envelope.id, ids::PING);
        let bytes = envelope.encode().unwrap();
        let decoded = Envelope::decode(&bytes).unwrap();
        assert_eq!(Ping::from_payload(&decoded.payload).unwrap(), Ping { nonce: 7 });
    }

    #[test]
    fn test_truncated_payload_is_malformed() {
        let envelope = SetGroupOutput {
            part: 1,
            group: 2,
            volume_db: -3.0,
            pan: 0.0,
            mute: false,
        }
        .to_envelope()
        .unwrap();
        let err = SetGroupOutput::from_payload(&envelope.payload[..3]).unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }

    #[test]
    fn test_builtin_ids_unique() {
        let all = [
            Ping::ID,
            RequestStatus::ID,
            LoadSample::ID,
            AddZone::ID,
            RemoveZone::ID,
            UpdateZone::ID,
            SetZoneRouting::ID,
            SetGroupRouting::ID,
            SetGroupOutput::ID,
            SetPart::ID,
            SetBus::ID,
            SetBusEffect::ID,
            Panic::ID,
            RequestPatchSummary::ID,
        ];
        let mut sorted = all.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), all.len());
        assert!(all.iter().all(|id| *id < CUSTOM_ID_BASE));
    }
}
