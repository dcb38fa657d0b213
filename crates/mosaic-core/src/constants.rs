//! Compile-time layout of the engine.
//!
//! Everything the audio thread iterates over is sized here so per-block work
//! never depends on a heap allocation.

/// Samples per processing block.
pub const BLOCK_SIZE: usize = 32;

/// `1 / BLOCK_SIZE`, for per-sample ramps across a block.
pub const BLOCK_SIZE_INV: f32 = 1.0 / BLOCK_SIZE as f32;

/// Stereo output slots: slot 0 is the main mix, slots 1.. are dedicated outputs.
pub const MAX_OUTPUTS: usize = 8;

/// Default voice pool size.
pub const DEFAULT_MAX_VOICES: usize = 64;

/// Upper bound accepted by [`EngineConfig::validate`](crate::EngineConfig::validate).
pub const MAX_VOICES_LIMIT: usize = 1024;

pub const NUM_PARTS: usize = 16;
pub const GROUPS_PER_PART: usize = 8;
pub const NUM_AUX_BUSSES: usize = 4;
pub const MAX_BUS_EFFECTS: usize = 4;

/// Slots in a zone or group routing table.
pub const MAX_ROUTING_ENTRIES: usize = 32;

pub const PROCESSORS_PER_ZONE: usize = 2;
pub const ENVELOPES_PER_ZONE: usize = 2;
pub const LFOS_PER_ZONE: usize = 3;
pub const LFOS_PER_GROUP: usize = 2;

/// Capacity of the audio <-> serialization lock-free queues.
pub const MESSAGE_QUEUE_CAPACITY: usize = 1024;

/// How long the serialization thread sleeps before re-checking for shutdown.
pub const SERIALIZATION_WAIT_MS: u64 = 50;

/// Amplitude below which a bus input counts as silent.
pub const SILENCE_THRESHOLD: f32 = 1e-6;

/// Edge threshold for envelope retrigger inputs.
pub const RETRIGGER_THRESHOLD: f32 = 0.5;

/// MIDI key range.
pub const NUM_KEYS: usize = 128;
