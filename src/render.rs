//! Offline rendering of an [`Engine`] into plain buffers.
//!
//! The renderer drives `process_audio` block by block with no real-time
//! constraint. Scheduled events take effect at the start of the block that
//! contains their offset, which is the resolution the engine runs at.

use crate::error::{Error, Result};
use mosaic_core::{BLOCK_SIZE, MAX_OUTPUTS};
use mosaic_engine::Engine;

/// Ringout allowed past the requested length before the render is cut.
const DEFAULT_TAIL_LIMIT_SECS: f64 = 10.0;

/// Something that happens at a sample offset during a render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderEvent {
    NoteOn {
        channel: i16,
        key: u8,
        note_id: i32,
        velocity: f32,
    },
    NoteOff {
        channel: i16,
        key: u8,
        note_id: i32,
    },
    SustainPedal {
        channel: u8,
        on: bool,
    },
    Panic,
}

/// Result of a render operation
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: f64,
    /// Peak level (linear)
    pub peak_level: f32,
    /// Includes the ringout past the requested length
    pub length_samples: usize,
}

impl RenderResult {
    pub fn duration_seconds(&self) -> f64 {
        self.length_samples as f64 / self.sample_rate
    }

    /// Interleaved stereo data `[L, R, L, R, ...]`
    pub fn interleaved(&self) -> Vec<f32> {
        self.left
            .iter()
            .zip(&self.right)
            .flat_map(|(l, r)| [*l, *r])
            .collect()
    }

    /// Write a 32-bit float stereo WAV file.
    #[cfg(feature = "wav")]
    pub fn write_wav(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: self.sample_rate.round() as u32,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for (l, r) in self.left.iter().zip(&self.right) {
            writer.write_sample(*l)?;
            writer.write_sample(*r)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

/// Renders a scheduled list of events through an engine.
///
/// ```ignore
/// let result = OfflineRenderer::new(&mut engine)
///     .note(0, 24_000, 60, 0.8)
///     .render(48_000)?;
/// result.write_wav("c4.wav")?;
/// ```
///
/// Messages queued through a [`ClientHandle`](mosaic_engine::ClientHandle)
/// are handled before every block while the serialization thread is not
/// running, so message-driven edits render deterministically.
pub struct OfflineRenderer<'a> {
    engine: &'a mut Engine,
    output: usize,
    events: Vec<(usize, RenderEvent)>,
    tail_limit: usize,
}

impl<'a> OfflineRenderer<'a> {
    pub fn new(engine: &'a mut Engine) -> Self {
        let tail_limit = (engine.sample_rate() * DEFAULT_TAIL_LIMIT_SECS) as usize;
        Self {
            engine,
            output: 0,
            events: Vec::new(),
            tail_limit,
        }
    }

    /// Which engine output to capture. Default: 0 (main).
    pub fn output(mut self, output: usize) -> Self {
        self.output = output;
        self
    }

    /// Maximum ringout rendered after the requested length.
    pub fn tail_limit(mut self, samples: usize) -> Self {
        self.tail_limit = samples;
        self
    }

    pub fn event(mut self, at: usize, event: RenderEvent) -> Self {
        self.events.push((at, event));
        self
    }

    /// Channel-0 note by key, held for `duration` samples.
    pub fn note(self, start: usize, duration: usize, key: u8, velocity: f32) -> Self {
        self.event(
            start,
            RenderEvent::NoteOn {
                channel: 0,
                key,
                note_id: -1,
                velocity,
            },
        )
        .event(
            start + duration,
            RenderEvent::NoteOff {
                channel: 0,
                key,
                note_id: -1,
            },
        )
    }

    /// Render at least `length_samples`, then keep going until every event
    /// has fired and the engine is silent, up to the tail limit.
    pub fn render(mut self, length_samples: usize) -> Result<RenderResult> {
        if self.output >= MAX_OUTPUTS {
            return Err(Error::Render(format!(
                "output {} out of range (max {})",
                self.output,
                MAX_OUTPUTS - 1
            )));
        }
        self.events.sort_by_key(|(at, _)| *at);

        let blocks = length_samples.div_ceil(BLOCK_SIZE);
        let limit = blocks + self.tail_limit.div_ceil(BLOCK_SIZE);
        let mut left = Vec::with_capacity(blocks * BLOCK_SIZE);
        let mut right = Vec::with_capacity(blocks * BLOCK_SIZE);
        let mut next = 0;
        let mut block = 0;

        loop {
            let finished = block >= blocks
                && next >= self.events.len()
                && self.engine.active_voices() == 0
                && self.engine.tail_samples() == 0;
            if finished {
                break;
            }
            if block >= limit {
                tracing::warn!(
                    tail_limit = self.tail_limit,
                    "offline render cut at tail limit"
                );
                break;
            }

            let end = (block + 1) * BLOCK_SIZE;
            while next < self.events.len() && self.events[next].0 < end {
                let event = self.events[next].1;
                apply(self.engine, event);
                next += 1;
            }
            if !self.engine.is_running() {
                self.engine.pump_messages()?;
            }

            let out = &self.engine.process_audio()[self.output];
            left.extend_from_slice(&out[0]);
            right.extend_from_slice(&out[1]);
            block += 1;
        }

        let peak_level = left
            .iter()
            .chain(right.iter())
            .fold(0.0f32, |peak, s| peak.max(s.abs()));
        tracing::debug!(blocks = block, peak_level, "offline render finished");

        Ok(RenderResult {
            length_samples: left.len(),
            left,
            right,
            sample_rate: self.engine.sample_rate(),
            peak_level,
        })
    }
}

fn apply(engine: &mut Engine, event: RenderEvent) {
    match event {
        RenderEvent::NoteOn {
            channel,
            key,
            note_id,
            velocity,
        } => {
            engine.note_on(channel, key, note_id, velocity, 0.0);
        }
        RenderEvent::NoteOff {
            channel,
            key,
            note_id,
        } => engine.note_off(channel, key, note_id, 0.0),
        RenderEvent::SustainPedal { channel, on } => engine.sustain_pedal(channel, on),
        RenderEvent::Panic => engine.panic(),
    }
}
