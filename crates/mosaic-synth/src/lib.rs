//! Synth building blocks for the Mosaic sampler.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`modulation`] | Source/destination ids, routing tables, [`ModulationMatrix`] |
//! | [`envelope`] | DAHDSR [`Envelope`] and its 2x [`OversampledEnvelope`] |
//! | [`lfo`] | Tagged LFO-slot [`Modulator`]: step, curve, envelope, MSEG |
//! | [`tables`] | Shared `2^x` lookup for times, rates and pitch |
//! | [`voice`] | [`VoiceAllocator`] with release-first stealing |
//!
//! Everything here is block-rate and allocation-free after construction.

pub mod envelope;
pub mod error;
pub mod lfo;
pub mod modulation;
pub mod tables;
pub mod voice;

pub use envelope::{
    EnvStage, Envelope, EnvelopeGenerator, EnvelopeStorage, OversampledEnvelope, Oversampling,
};
pub use error::{Error, Result};
pub use lfo::{
    CurveShape, Modulator, ModulatorShape, ModulatorStorage, MsegSegment, MsegStorage,
    StepStorage, TriggerMode,
};
pub use modulation::{
    DestValues, ModDest, ModSource, ModulationMatrix, RawRoute, RoutingEntry, RoutingTable,
    SourceLayout,
};
pub use tables::Exp2Table;
pub use voice::{AllocationResult, AllocationStrategy, VoiceAllocator, VoiceId, VoiceSlot, VoiceState};
