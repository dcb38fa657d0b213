//! Builder for configuring and constructing an [`Engine`].

use crate::engine::Engine;
use crate::messaging::Handler;
use crate::Result;
use mosaic_core::{EngineConfig, SampleLoader, SampleManager};
use mosaic_synth::AllocationStrategy;
use std::sync::Arc;
use std::time::Duration;

/// Fluent engine configuration.
///
/// # Example
///
/// ```ignore
/// use mosaic_engine::Engine;
/// use mosaic_synth::AllocationStrategy;
///
/// let engine = Engine::builder()
///     .sample_rate(44100.0)
///     .max_voices(128)
///     .stealing(AllocationStrategy::Quietest)
///     .build()?;
/// ```
pub struct EngineBuilder {
    config: EngineConfig,
    strategy: AllocationStrategy,
    samples: Option<Arc<SampleManager>>,
    handlers: Vec<(u16, Handler)>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            strategy: AllocationStrategy::default(),
            samples: None,
            handlers: Vec::new(),
        }
    }
}

impl EngineBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 48000
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Default: 64
    pub fn max_voices(mut self, count: usize) -> Self {
        self.config.max_voices = count;
        self
    }

    /// Default: 1024
    pub fn message_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.message_queue_capacity = capacity;
        self
    }

    /// Default: 50 ms
    pub fn serialization_wait(mut self, wait: Duration) -> Self {
        self.config.serialization_wait = wait;
        self
    }

    /// Which voice to take when the pool is full. Default: oldest.
    pub fn stealing(mut self, strategy: AllocationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Share an existing sample store.
    pub fn sample_manager(mut self, samples: Arc<SampleManager>) -> Self {
        self.samples = Some(samples);
        self
    }

    /// Decode samples with `loader` instead of the default.
    pub fn sample_loader(mut self, loader: impl SampleLoader + 'static) -> Self {
        self.samples = Some(Arc::new(SampleManager::new(loader)));
        self
    }

    /// Register a handler for a custom message id.
    pub fn handler(mut self, id: u16, handler: Handler) -> Self {
        self.handlers.push((id, handler));
        self
    }

    pub fn build(self) -> Result<Engine> {
        let samples = self.samples.unwrap_or_default();
        Engine::from_parts(self.config, self.strategy, samples, self.handlers)
    }
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("strategy", &self.strategy)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
