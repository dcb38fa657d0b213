//! Engine configuration.

use crate::constants::{
    DEFAULT_MAX_VOICES, MAX_VOICES_LIMIT, MESSAGE_QUEUE_CAPACITY, SERIALIZATION_WAIT_MS,
};
use crate::{Error, Result};
use std::time::Duration;

/// Runtime configuration for the sampler engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub sample_rate: f64,
    /// Size of the pre-allocated voice pool.
    pub max_voices: usize,
    /// Capacity of each audio <-> serialization queue.
    pub message_queue_capacity: usize,
    /// Condvar timeout of the serialization loop.
    pub serialization_wait: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            max_voices: DEFAULT_MAX_VOICES,
            message_queue_capacity: MESSAGE_QUEUE_CAPACITY,
            serialization_wait: Duration::from_millis(SERIALIZATION_WAIT_MS),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate < 8000.0 || self.sample_rate > 384000.0 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.max_voices == 0 || self.max_voices > MAX_VOICES_LIMIT {
            return Err(Error::InvalidConfig(format!(
                "max_voices {} out of range (1-{})",
                self.max_voices, MAX_VOICES_LIMIT
            )));
        }
        if self.message_queue_capacity < 16 {
            return Err(Error::InvalidConfig(format!(
                "message_queue_capacity {} too small (minimum 16)",
                self.message_queue_capacity
            )));
        }
        if self.serialization_wait.is_zero() {
            return Err(Error::InvalidConfig(
                "serialization_wait must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
