//! Mosaic sampler engine.
//!
//! # Signal path
//!
//! | Module | Role |
//! |--------|------|
//! | [`zone`] | key/velocity-mapped sample with its modulation setup |
//! | [`playback`] | interpolating sample reader with loop modes |
//! | [`processor`] | per-voice filter / drive / crush slots |
//! | [`voice`] | one playing zone: modulators, matrix, playback, processors |
//! | [`pool`] | fixed voice pool with stealing and fade tails |
//! | [`group`] / [`part`] | group mix with group LFOs; MIDI-addressed parts |
//! | [`bus`] | part / aux / main busses with effects, sends and ringout |
//! | [`patch`] | the per-block graph walk |
//! | [`Engine`] | audio-thread entry points and setup API |
//! | [`messaging`] | audio / serialization / client threads |
//!
//! The audio thread only touches [`Engine::note_on`], [`Engine::note_off`]
//! and [`Engine::process_audio`]. Everything else runs on the serialization
//! thread or during setup.

pub mod error;
pub use error::{Error, Result};

pub mod bus;
pub use bus::{BusAddress, BusEffect, BusEffectSpec, BusSettings, SendSettings, SendTap};

mod builder;
pub use builder::EngineBuilder;

mod engine;
pub use engine::Engine;

pub mod group;
pub use group::GroupSettings;

pub mod messaging;
pub use messaging::{ClientHandle, MessageController, SerializationToClient, ZoneSpec};

pub mod part;
pub use part::{PartChannel, PartSettings};

pub mod patch;
pub use patch::{OutputBuffers, Patch};

pub mod playback;

pub mod pool;
pub use pool::VoicePool;

pub mod processor;
pub use processor::{FilterMode, ProcessorKind, ProcessorStorage};

pub mod status;
pub use status::{EngineStatus, StatusSnapshot};

pub mod voice;

pub mod zone;
pub use zone::{LoopMode, MidiRange, PlayMode, SampleRef, SampleRegion, Zone, ZoneData};
