//! # Mosaic - polyphonic multi-sample sampler
//!
//! ## Architecture
//!
//! Mosaic is an umbrella crate over:
//! - **mosaic-core** - configuration, constants, lock-free atomics, sample store
//! - **mosaic-synth** - envelopes, LFO-slot modulators, modulation matrix, voice allocation
//! - **mosaic-engine** - zones, voices, busses, the patch graph, the engine and its messaging
//!
//! ## Quick Start
//!
//! ```ignore
//! use mosaic::prelude::*;
//!
//! let mut engine = Engine::builder().sample_rate(48000.0).build()?;
//! let id = engine.load_sample("piano_c4.wav")?;
//! engine.add_zone(0, 0, ZoneSpec { data: ZoneData::default(), sample: SampleRef::Id(id) })?;
//!
//! // Real-time: note events plus one `process_audio` per block
//! engine.note_on(0, 60, -1, 0.8, 0.0);
//! let outputs = engine.process_audio();
//!
//! // Offline
//! let render = OfflineRenderer::new(&mut engine).note(0, 48_000, 64, 0.7).render(96_000)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `wav` (default) - WAV sample loading and render export through `hound`
//! - `instrument` - live instance counters for leak hunting

/// Re-export of mosaic-core for direct access
pub use mosaic_core as core;
/// Re-export of mosaic-synth for direct access
pub use mosaic_synth as synth;
/// Re-export of mosaic-engine for direct access
pub use mosaic_engine as engine;

pub use mosaic_core::{
    EngineConfig, Sample, SampleId, SampleLoader, SampleManager, SampleRateContext, StereoBlock,
    BLOCK_SIZE, MAX_OUTPUTS,
};

#[cfg(feature = "wav")]
pub use mosaic_core::WavLoader;

pub use mosaic_synth::{
    AllocationStrategy, EnvelopeStorage, ModDest, ModSource, ModulatorShape, ModulatorStorage,
    RawRoute, RoutingEntry, RoutingTable,
};

pub use mosaic_engine::{
    BusAddress, BusEffectSpec, BusSettings, ClientHandle, Engine, EngineBuilder, EngineStatus,
    GroupSettings, LoopMode, MidiRange, OutputBuffers, PartChannel, PartSettings, PlayMode,
    SampleRef, SampleRegion, SendSettings, SendTap, SerializationToClient, StatusSnapshot,
    ZoneData, ZoneSpec,
};

/// Client message types for [`ClientHandle::send`].
pub use mosaic_engine::messaging::protocol as messages;

mod error;
pub use error::{Error, Result};

mod render;
pub use render::{OfflineRenderer, RenderEvent, RenderResult};

/// Convenience prelude for common imports
pub mod prelude {
    // Engine
    pub use crate::{Engine, EngineBuilder, EngineConfig, OfflineRenderer, RenderEvent};

    // Authoring
    pub use crate::{
        BusAddress, BusEffectSpec, BusSettings, EnvelopeStorage, GroupSettings, LoopMode,
        MidiRange, PartChannel, PartSettings, PlayMode, SampleRef, SampleRegion, SendSettings,
        SendTap, ZoneData, ZoneSpec,
    };

    // Modulation
    pub use crate::{ModDest, ModSource, RawRoute, RoutingEntry};

    // Samples
    pub use crate::{Sample, SampleId, SampleManager};

    // Messaging
    pub use crate::engine::messaging::ClientMessage;
    pub use crate::{messages, ClientHandle, SerializationToClient};

    pub use crate::{Error, Result};
}
