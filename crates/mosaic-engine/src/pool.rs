//! Fixed-capacity voice pool.
//!
//! Slot bookkeeping lives in [`VoiceAllocator`]; the DSP voices sit in a
//! parallel array sized once at construction. Nothing here allocates after
//! `new`.

use crate::voice::{FadeTail, NoteStart, Voice};
use crate::zone::ZoneData;
use mosaic_core::{Sample, SampleRateContext, BLOCK_SIZE, GROUPS_PER_PART, LFOS_PER_GROUP, NUM_PARTS};
use mosaic_synth::{AllocationResult, AllocationStrategy, VoiceAllocator, VoiceState};
use std::sync::Arc;

/// How a note-on addresses its voices for later release: the key as
/// received, before any part transposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteTrigger {
    pub channel: i16,
    pub key: u8,
    /// `-1` matches by key only
    pub note_id: i32,
}

impl NoteTrigger {
    pub fn new(channel: i16, key: u8, note_id: i32) -> Self {
        Self {
            channel,
            key,
            note_id,
        }
    }
}

/// Outcome of [`VoicePool::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { slot: usize },
    /// A voice from `(part, group)` was faded out to make room
    Stole {
        slot: usize,
        part: usize,
        group: usize,
    },
    /// Pool exhausted and stealing disabled
    Dropped,
}

pub struct VoicePool {
    allocator: VoiceAllocator,
    voices: Vec<Voice>,
    /// One fade accumulator per `(part, group)`; repeated steals in one block
    /// mix into it instead of replacing each other.
    tails: Vec<FadeTail>,
    pending: Vec<bool>,
}

impl VoicePool {
    pub fn new(max_voices: usize, strategy: AllocationStrategy, context: SampleRateContext) -> Self {
        Self {
            allocator: VoiceAllocator::new(max_voices, strategy),
            voices: (0..max_voices).map(|_| Voice::new(context)).collect(),
            tails: (0..NUM_PARTS * GROUPS_PER_PART)
                .map(|i| FadeTail {
                    part: i / GROUPS_PER_PART,
                    group: i % GROUPS_PER_PART,
                    block: [[0.0; BLOCK_SIZE]; 2],
                })
                .collect(),
            pending: vec![false; NUM_PARTS * GROUPS_PER_PART],
        }
    }

    /// Claim a slot (stealing if needed) and start `zone` on it.
    pub fn start(
        &mut self,
        zone: &ZoneData,
        sample: &Arc<Sample>,
        trigger: NoteTrigger,
        note: NoteStart,
    ) -> StartOutcome {
        let result = self.allocator.allocate(
            trigger.key,
            trigger.channel,
            trigger.note_id,
            note.velocity,
        );
        let outcome = match result {
            AllocationResult::Allocated { slot_index, .. } => StartOutcome::Started { slot: slot_index },
            AllocationResult::Stolen { slot_index, .. } => {
                let voice = &mut self.voices[slot_index];
                let outcome = if voice.is_active() {
                    StartOutcome::Stole {
                        slot: slot_index,
                        part: voice.part(),
                        group: voice.group(),
                    }
                } else {
                    StartOutcome::Started { slot: slot_index }
                };
                if let Some(tail) = voice.fade_out() {
                    Self::stash_tail(&mut self.tails, &mut self.pending, &tail);
                }
                outcome
            }
            AllocationResult::Unavailable => return StartOutcome::Dropped,
        };

        let slot = match outcome {
            StartOutcome::Started { slot } | StartOutcome::Stole { slot, .. } => slot,
            StartOutcome::Dropped => return outcome,
        };
        self.voices[slot].start(zone, Arc::clone(sample), note);
        outcome
    }

    /// Note-off for every voice matching `(channel, key, note_id)`.
    pub fn release(&mut self, channel: i16, key: u8, note_id: i32, release_velocity: f32) {
        let voices = &mut self.voices;
        self.allocator.release(channel, key, note_id, |slot| {
            voices[slot].release(release_velocity);
        });
    }

    pub fn sustain_pedal(&mut self, channel: u8, on: bool) {
        let voices = &mut self.voices;
        self.allocator.sustain_pedal(channel, on, |slot| {
            voices[slot].release(0.0);
        });
    }

    pub fn all_notes_off(&mut self) {
        let voices = &mut self.voices;
        self.allocator.all_notes_off(|slot| {
            voices[slot].release(0.0);
        });
    }

    /// Fade every sounding voice out over one block and free all slots.
    pub fn panic(&mut self) {
        for (slot, voice) in self.voices.iter_mut().enumerate() {
            if let Some(tail) = voice.fade_out() {
                Self::stash_tail(&mut self.tails, &mut self.pending, &tail);
            }
            self.allocator.voice_finished(slot);
        }
        self.allocator.reset();
    }

    /// Run every active voice of `part` and hand its block to `sink`
    /// together with its group index. Finished voices go back to the pool
    /// and are reported through `on_finished`.
    pub fn render_part(
        &mut self,
        part: usize,
        group_lfos: impl Fn(usize) -> [f32; LFOS_PER_GROUP],
        mut sink: impl FnMut(usize, &[[f32; BLOCK_SIZE]; 2]),
        mut on_finished: impl FnMut(usize),
    ) {
        for (slot, voice) in self.voices.iter_mut().enumerate() {
            if !voice.is_active() || voice.part() != part {
                continue;
            }
            let group = voice.group();
            let alive = voice.process(group_lfos(group));
            sink(group, voice.output());
            if alive {
                self.allocator.update_envelope_level(slot, voice.level());
            } else {
                self.allocator.voice_finished(slot);
                on_finished(group);
            }
        }
    }

    /// Hand every pending fade tail of `part` to `sink`, one per group, and
    /// clear them.
    pub fn drain_tails(&mut self, part: usize, mut sink: impl FnMut(&FadeTail)) {
        if part >= NUM_PARTS {
            return;
        }
        let range = part * GROUPS_PER_PART..(part + 1) * GROUPS_PER_PART;
        for (tail, pending) in self.tails[range.clone()].iter_mut().zip(&mut self.pending[range]) {
            if *pending {
                sink(&*tail);
                tail.block = [[0.0; BLOCK_SIZE]; 2];
                *pending = false;
            }
        }
    }

    fn stash_tail(tails: &mut [FadeTail], pending: &mut [bool], tail: &FadeTail) {
        debug_assert!(tail.part < NUM_PARTS && tail.group < GROUPS_PER_PART);
        let index = tail.part * GROUPS_PER_PART + tail.group;
        let (Some(target), Some(flag)) = (tails.get_mut(index), pending.get_mut(index)) else {
            return;
        };
        for (dst, src) in target.block.iter_mut().zip(&tail.block) {
            for (d, s) in dst.iter_mut().zip(src) {
                *d += s;
            }
        }
        *flag = true;
    }

    /// Call once per block after rendering.
    pub fn advance_time(&mut self) {
        self.allocator.advance_time(BLOCK_SIZE as u64);
    }

    /// Slots currently sounding (active or releasing).
    pub fn active_count(&self) -> usize {
        self.allocator.active_count()
    }

    pub fn releasing_count(&self) -> usize {
        self.allocator
            .slots()
            .iter()
            .filter(|s| s.state == VoiceState::Releasing)
            .count()
    }

    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    pub fn strategy(&self) -> AllocationStrategy {
        self.allocator.strategy()
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn allocator(&self) -> &VoiceAllocator {
        &self.allocator
    }
}
