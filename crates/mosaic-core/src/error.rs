//! Error types for mosaic-core.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for mosaic-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Sample not found: {0:?}")]
    SampleNotFound(PathBuf),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Empty sample: {0:?}")]
    EmptySample(PathBuf),

    #[cfg(feature = "wav")]
    #[error("WAV decode error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
