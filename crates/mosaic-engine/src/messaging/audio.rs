//! Audio-thread side of the messaging substrate.
//!
//! Two SPSC ring buffers connect the serialization thread and the audio
//! thread. Commands flow one way; results and every heap payload the audio
//! thread replaced flow back so they are dropped off the audio thread.

use crate::bus::{BusAddress, BusEffect, BusSettings};
use crate::group::GroupSettings;
use crate::messaging::protocol::CommandKind;
use crate::part::PartSettings;
use crate::patch::Patch;
use crate::pool::VoicePool;
use crate::zone::Zone;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::fmt;

/// What an [`AudioCallback`] sees when the audio thread runs it.
pub struct AudioContext<'a> {
    pub patch: &'a mut Patch,
    pub voices: &'a mut VoicePool,
}

pub type AudioFn = Box<dyn FnMut(&mut AudioContext<'_>) + Send>;

/// Reusable shell around an audio-thread edit.
///
/// Shells come from a [`CallbackPool`] on the serialization thread, cross to
/// the audio thread inside [`AudioCommand::Callback`], run once, and come back
/// so the closure is dropped where it was created.
#[derive(Default)]
pub struct AudioCallback {
    f: Option<AudioFn>,
}

impl AudioCallback {
    pub fn set(&mut self, f: AudioFn) {
        self.f = Some(f);
    }

    pub fn is_empty(&self) -> bool {
        self.f.is_none()
    }

    #[inline]
    fn run(&mut self, context: &mut AudioContext<'_>) {
        if let Some(f) = self.f.as_mut() {
            f(context);
        }
    }

    fn clear(&mut self) {
        self.f = None;
    }
}

impl fmt::Debug for AudioCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioCallback")
            .field("armed", &self.f.is_some())
            .finish()
    }
}

/// Free list of callback shells, owned by the serialization thread.
#[derive(Debug)]
pub struct CallbackPool {
    free: Vec<Box<AudioCallback>>,
    created: usize,
}

impl CallbackPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: (0..capacity).map(|_| Box::default()).collect(),
            created: capacity,
        }
    }

    /// Take a shell, allocating one if the free list ran dry.
    pub fn get_audio_thread_callback(&mut self) -> Box<AudioCallback> {
        match self.free.pop() {
            Some(shell) => shell,
            None => {
                self.created += 1;
                tracing::debug!(total = self.created, "callback pool grew");
                Box::default()
            }
        }
    }

    /// Drop the shell's closure and put it back on the free list.
    pub fn return_audio_thread_callback(&mut self, mut shell: Box<AudioCallback>) {
        shell.clear();
        self.free.push(shell);
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn created(&self) -> usize {
        self.created
    }
}

/// Serialization -> audio.
pub enum AudioCommand {
    SwapZones {
        part: usize,
        group: usize,
        zones: Vec<Zone>,
    },
    SetGroup {
        part: usize,
        group: usize,
        settings: Box<GroupSettings>,
    },
    SetPart {
        part: usize,
        settings: PartSettings,
    },
    SetBus {
        bus: BusAddress,
        settings: BusSettings,
    },
    SetBusEffect {
        bus: BusAddress,
        slot: usize,
        effect: Option<Box<BusEffect>>,
    },
    Panic,
    Callback(Box<AudioCallback>),
}

impl AudioCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            AudioCommand::SwapZones { .. } => CommandKind::Zones,
            AudioCommand::SetGroup { .. } => CommandKind::Group,
            AudioCommand::SetPart { .. } => CommandKind::Part,
            AudioCommand::SetBus { .. } => CommandKind::Bus,
            AudioCommand::SetBusEffect { .. } => CommandKind::BusEffect,
            AudioCommand::Panic => CommandKind::Panic,
            AudioCommand::Callback(_) => CommandKind::Callback,
        }
    }
}

impl fmt::Debug for AudioCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AudioCommand::{:?}", self.kind())
    }
}

/// Audio -> serialization. Carries replaced payloads home.
pub enum AudioToSerialization {
    ZonesSwapped {
        part: usize,
        group: usize,
        zone_count: usize,
        retired: Vec<Zone>,
    },
    GroupUpdated {
        part: usize,
        group: usize,
        previous: Box<GroupSettings>,
    },
    EffectReplaced {
        bus: BusAddress,
        slot: usize,
        previous: Option<Box<BusEffect>>,
    },
    Applied(CommandKind),
    CallbackReturned(Box<AudioCallback>),
}

impl fmt::Debug for AudioToSerialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioToSerialization::ZonesSwapped {
                part,
                group,
                zone_count,
                ..
            } => write!(f, "ZonesSwapped({part}, {group}, {zone_count})"),
            AudioToSerialization::GroupUpdated { part, group, .. } => {
                write!(f, "GroupUpdated({part}, {group})")
            }
            AudioToSerialization::EffectReplaced { bus, slot, .. } => {
                write!(f, "EffectReplaced({bus}, {slot})")
            }
            AudioToSerialization::Applied(kind) => write!(f, "Applied({kind:?})"),
            AudioToSerialization::CallbackReturned(_) => write!(f, "CallbackReturned"),
        }
    }
}

/// Audio thread's ends of the two queues.
pub struct AudioEndpoint {
    commands: HeapCons<AudioCommand>,
    events: HeapProd<AudioToSerialization>,
}

/// Serialization thread's ends of the two queues.
pub struct SerializationEndpoint {
    commands: HeapProd<AudioCommand>,
    events: HeapCons<AudioToSerialization>,
}

/// Allocate both queues with `capacity` slots each.
pub fn message_queues(capacity: usize) -> (SerializationEndpoint, AudioEndpoint) {
    let (command_tx, command_rx) = HeapRb::<AudioCommand>::new(capacity).split();
    let (event_tx, event_rx) = HeapRb::<AudioToSerialization>::new(capacity).split();
    (
        SerializationEndpoint {
            commands: command_tx,
            events: event_rx,
        },
        AudioEndpoint {
            commands: command_rx,
            events: event_tx,
        },
    )
}

impl SerializationEndpoint {
    /// Queue a command for the next audio block. A full queue hands the
    /// command back.
    pub fn schedule(&mut self, command: AudioCommand) -> Result<(), AudioCommand> {
        self.commands.try_push(command)
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.occupied_len()
    }

    pub fn try_recv(&mut self) -> Option<AudioToSerialization> {
        self.events.try_pop()
    }
}

impl AudioEndpoint {
    /// Apply every queued command. Called at the top of each audio block.
    pub fn drain(&mut self, patch: &mut Patch, voices: &mut VoicePool) {
        while let Some(command) = self.commands.try_pop() {
            let event = apply(command, patch, voices);
            self.send(event);
        }
    }

    #[inline]
    fn send(&mut self, event: AudioToSerialization) {
        if let Err(event) = self.events.try_push(event) {
            debug_assert!(false, "audio -> serialization queue full");
            // Leaked, never freed on the audio thread.
            std::mem::forget(event);
        }
    }
}

fn apply(command: AudioCommand, patch: &mut Patch, voices: &mut VoicePool) -> AudioToSerialization {
    match command {
        AudioCommand::SwapZones {
            part,
            group,
            mut zones,
        } => {
            let zone_count = zones.len();
            if let Some(g) = patch.group_mut(part, group) {
                std::mem::swap(&mut g.zones, &mut zones);
            }
            AudioToSerialization::ZonesSwapped {
                part,
                group,
                zone_count,
                retired: zones,
            }
        }
        AudioCommand::SetGroup {
            part,
            group,
            mut settings,
        } => {
            if let Some(g) = patch.group_mut(part, group) {
                g.swap_settings(&mut settings);
            }
            AudioToSerialization::GroupUpdated {
                part,
                group,
                previous: settings,
            }
        }
        AudioCommand::SetPart { part, settings } => {
            if let Some(p) = patch.part_mut(part) {
                p.settings = settings;
            }
            AudioToSerialization::Applied(CommandKind::Part)
        }
        AudioCommand::SetBus { bus, settings } => {
            if let Some(b) = patch.bus_mut(bus) {
                b.set_settings(settings);
            }
            AudioToSerialization::Applied(CommandKind::Bus)
        }
        AudioCommand::SetBusEffect { bus, slot, effect } => {
            let previous = match patch.bus_mut(bus) {
                Some(b) => match b.replace_effect(slot, effect) {
                    Ok(previous) => previous,
                    Err(rejected) => rejected,
                },
                None => effect,
            };
            AudioToSerialization::EffectReplaced { bus, slot, previous }
        }
        AudioCommand::Panic => {
            patch.panic(voices);
            AudioToSerialization::Applied(CommandKind::Panic)
        }
        AudioCommand::Callback(mut shell) => {
            shell.run(&mut AudioContext { patch, voices });
            AudioToSerialization::CallbackReturned(shell)
        }
    }
}
