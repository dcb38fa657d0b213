//! Error types for mosaic-engine.

use thiserror::Error;

/// Errors from the engine and its control plane.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] mosaic_core::Error),

    #[error(transparent)]
    Modulation(#[from] mosaic_synth::Error),

    #[error("Part {0} out of range")]
    InvalidPart(usize),

    #[error("Group {group} out of range in part {part}")]
    InvalidGroup { part: usize, group: usize },

    #[error("Zone {zone} out of range in part {part} group {group}")]
    InvalidZone {
        part: usize,
        group: usize,
        zone: usize,
    },

    #[error("Bus {0} does not exist")]
    InvalidBus(String),

    #[error("Effect slot {0} out of range")]
    InvalidEffectSlot(usize),

    #[error("Output {0} out of range")]
    InvalidOutput(u8),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Sample not loaded: {0}")]
    SampleUnavailable(String),

    #[error("Unknown message id {0}")]
    UnknownMessage(u16),

    #[error("Malformed message: {0}")]
    Malformed(#[from] bincode::Error),

    #[error("Audio queue full")]
    QueueFull,

    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    #[error("Serialization thread already started")]
    AlreadyStarted,
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
