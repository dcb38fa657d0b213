//! Error types for mosaic-synth.

use thiserror::Error;

/// Result type alias for mosaic-synth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mosaic-synth.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Raw modulation source id outside the known set.
    #[error("Invalid modulation source id: {0}")]
    InvalidSource(u8),

    /// Raw modulation destination id outside the known set.
    #[error("Invalid modulation destination id: {0}")]
    InvalidDestination(u8),

    /// Routing slot index past the end of the table.
    #[error("Routing slot {0} out of range")]
    InvalidSlot(usize),

    /// Non-finite routing depth.
    #[error("Invalid routing depth: {0}")]
    InvalidDepth(f32),
}
