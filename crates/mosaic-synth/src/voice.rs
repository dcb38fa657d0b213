//! Fixed-capacity voice slot allocator with stealing.
//!
//! Tracks slot bookkeeping only (state, key, age, level); the DSP voices live
//! in a parallel array owned by the engine and are addressed by slot index.
//!
//! Stealing when every slot is busy:
//! 1. a releasing voice, quietest first (oldest on ties)
//! 2. otherwise per [`AllocationStrategy`]
//!
//! All methods are RT-safe (no allocations after construction).

/// Unique identifier for a voice instance.
pub type VoiceId = u64;

/// What to steal when no releasing voice is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocationStrategy {
    /// Steal the oldest playing voice
    #[default]
    Oldest,
    /// Steal the quietest voice (lowest envelope level)
    Quietest,
    /// Never steal - drop new notes if no voices available
    NoSteal,
}

/// State of a single voice slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    /// Voice is idle and available for allocation
    #[default]
    Idle,
    /// Voice is gated (attack/decay/sustain)
    Active,
    /// Voice is in release phase
    Releasing,
}

/// Bookkeeping for one voice slot.
#[derive(Debug, Clone, Copy)]
pub struct VoiceSlot {
    pub voice_id: VoiceId,
    pub key: u8,
    pub channel: i16,
    /// Host note id, -1 when the host does not supply one
    pub note_id: i32,
    pub velocity: f32,
    /// Current amplitude envelope level, for quietest stealing
    pub envelope_level: f32,
    /// Sample time the voice started
    pub start_time: u64,
    pub state: VoiceState,
    /// Key is up but the sustain pedal holds the voice
    pub sustained: bool,
}

impl Default for VoiceSlot {
    fn default() -> Self {
        Self {
            voice_id: 0,
            key: 0,
            channel: 0,
            note_id: -1,
            velocity: 0.0,
            envelope_level: 0.0,
            start_time: 0,
            state: VoiceState::Idle,
            sustained: false,
        }
    }
}

impl VoiceSlot {
    /// Does this slot answer to a note-off for `(channel, key, note_id)`?
    /// A note id of -1 on either side falls back to key matching.
    #[inline]
    pub fn matches(&self, channel: i16, key: u8, note_id: i32) -> bool {
        if channel >= 0 && self.channel >= 0 && self.channel != channel {
            return false;
        }
        if note_id >= 0 && self.note_id >= 0 {
            self.note_id == note_id
        } else {
            self.key == key
        }
    }
}

/// Result of attempting to allocate a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationResult {
    /// A free slot was used
    Allocated { voice_id: VoiceId, slot_index: usize },
    /// A busy slot was taken over; the caller fades out the old voice
    Stolen {
        voice_id: VoiceId,
        slot_index: usize,
        stolen_voice_id: VoiceId,
    },
    /// No slot available (NoSteal strategy)
    Unavailable,
}

impl AllocationResult {
    pub fn slot_index(&self) -> Option<usize> {
        match *self {
            AllocationResult::Allocated { slot_index, .. }
            | AllocationResult::Stolen { slot_index, .. } => Some(slot_index),
            AllocationResult::Unavailable => None,
        }
    }
}

/// Polyphonic voice slot allocator.
#[derive(Debug, Clone)]
pub struct VoiceAllocator {
    strategy: AllocationStrategy,
    slots: Vec<VoiceSlot>,
    next_voice_id: VoiceId,
    current_time: u64,
    /// Sustain pedal state per channel (0-15)
    sustain_pedal: [bool; 16],
}

impl VoiceAllocator {
    pub fn new(max_voices: usize, strategy: AllocationStrategy) -> Self {
        Self {
            strategy,
            slots: vec![VoiceSlot::default(); max_voices],
            next_voice_id: 1,
            current_time: 0,
            sustain_pedal: [false; 16],
        }
    }

    /// Claim a slot for a new note, stealing if needed.
    pub fn allocate(&mut self, key: u8, channel: i16, note_id: i32, velocity: f32) -> AllocationResult {
        let (slot_index, stolen) = match self.find_idle_slot() {
            Some(i) => (i, None),
            None => match self.find_slot_to_steal() {
                Some(i) => (i, Some(self.slots[i].voice_id)),
                None => return AllocationResult::Unavailable,
            },
        };

        let voice_id = self.next_voice_id;
        self.next_voice_id += 1;
        self.slots[slot_index] = VoiceSlot {
            voice_id,
            key,
            channel,
            note_id,
            velocity,
            // Full level until the first block reports, so quietest
            // stealing leaves fresh voices alone
            envelope_level: 1.0,
            start_time: self.current_time,
            state: VoiceState::Active,
            sustained: false,
        };

        match stolen {
            Some(stolen_voice_id) => AllocationResult::Stolen {
                voice_id,
                slot_index,
                stolen_voice_id,
            },
            None => AllocationResult::Allocated {
                voice_id,
                slot_index,
            },
        }
    }

    /// Note-off. `on_release` is called with every slot that moves to release;
    /// slots held by the sustain pedal are only marked.
    pub fn release(&mut self, channel: i16, key: u8, note_id: i32, mut on_release: impl FnMut(usize)) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.state != VoiceState::Active || slot.sustained || !slot.matches(channel, key, note_id) {
                continue;
            }
            if Self::pedal_down(&self.sustain_pedal, slot.channel) {
                slot.sustained = true;
            } else {
                slot.state = VoiceState::Releasing;
                on_release(i);
            }
        }
    }

    /// Sustain pedal (CC 64). Lifting it releases every held voice on the channel.
    pub fn sustain_pedal(&mut self, channel: u8, on: bool, mut on_release: impl FnMut(usize)) {
        if channel >= 16 {
            return;
        }
        self.sustain_pedal[channel as usize] = on;
        if on {
            return;
        }
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.channel == channel as i16 && slot.sustained {
                slot.sustained = false;
                if slot.state == VoiceState::Active {
                    slot.state = VoiceState::Releasing;
                    on_release(i);
                }
            }
        }
    }

    /// Release every gated voice.
    pub fn all_notes_off(&mut self, mut on_release: impl FnMut(usize)) {
        self.sustain_pedal = [false; 16];
        for (i, slot) in self.slots.iter_mut().enumerate() {
            slot.sustained = false;
            if slot.state == VoiceState::Active {
                slot.state = VoiceState::Releasing;
                on_release(i);
            }
        }
    }

    /// Mark a slot free once its voice has finished sounding.
    pub fn voice_finished(&mut self, slot_index: usize) {
        if let Some(slot) = self.slots.get_mut(slot_index) {
            slot.state = VoiceState::Idle;
            slot.sustained = false;
            slot.envelope_level = 0.0;
        }
    }

    /// Update envelope level for a slot (for quietest stealing).
    #[inline]
    pub fn update_envelope_level(&mut self, slot_index: usize, level: f32) {
        if let Some(slot) = self.slots.get_mut(slot_index) {
            slot.envelope_level = level;
        }
    }

    /// Advance time counter (call each block).
    pub fn advance_time(&mut self, samples: u64) {
        self.current_time = self.current_time.wrapping_add(samples);
    }

    pub fn current_time(&self) -> u64 {
        self.current_time
    }

    /// Get the number of non-idle slots.
    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.state != VoiceState::Idle)
            .count()
    }

    pub fn max_voices(&self) -> usize {
        self.slots.len()
    }

    pub fn strategy(&self) -> AllocationStrategy {
        self.strategy
    }

    pub fn set_strategy(&mut self, strategy: AllocationStrategy) {
        self.strategy = strategy;
    }

    pub fn slots(&self) -> &[VoiceSlot] {
        &self.slots
    }

    pub fn get_slot(&self, index: usize) -> Option<&VoiceSlot> {
        self.slots.get(index)
    }

    /// Reset all slots to idle.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = VoiceSlot::default();
        }
        self.sustain_pedal = [false; 16];
    }

    #[inline]
    fn pedal_down(pedals: &[bool; 16], channel: i16) -> bool {
        (0..16).contains(&channel) && pedals[channel as usize]
    }

    fn find_idle_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.state == VoiceState::Idle)
    }

    fn find_slot_to_steal(&self) -> Option<usize> {
        if self.strategy == AllocationStrategy::NoSteal {
            return None;
        }

        // First, try to steal a releasing voice
        let releasing = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.state == VoiceState::Releasing)
            .min_by(|(_, a), (_, b)| {
                a.envelope_level
                    .partial_cmp(&b.envelope_level)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.start_time.cmp(&b.start_time))
                    .then(a.voice_id.cmp(&b.voice_id))
            });

        if let Some((i, _)) = releasing {
            return Some(i);
        }

        let active = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.state == VoiceState::Active);

        match self.strategy {
            // Voices started in the same block share a start time; the id
            // keeps a note's own fresh voices from stealing each other
            AllocationStrategy::Oldest => active
                .min_by_key(|(_, s)| (s.start_time, s.voice_id))
                .map(|(i, _)| i),
            AllocationStrategy::Quietest => active
                .min_by(|(_, a), (_, b)| {
                    a.envelope_level
                        .partial_cmp(&b.envelope_level)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.voice_id.cmp(&b.voice_id))
                })
                .map(|(i, _)| i),
            AllocationStrategy::NoSteal => None,
        }
    }
}
