//! Centralized error type for the mosaic umbrella crate.
//!
//! Wraps the subsystem errors so `?` propagates across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] mosaic_core::Error),

    #[error("Modulation: {0}")]
    Synth(#[from] mosaic_synth::Error),

    #[error(transparent)]
    Engine(#[from] mosaic_engine::Error),

    #[cfg(feature = "wav")]
    #[error("WAV export: {0}")]
    Wav(#[from] hound::Error),

    #[error("Render: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, Error>;
