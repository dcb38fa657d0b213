//! Client message handlers, run on the serialization thread.

use super::audio::{AudioCommand, AudioContext, CallbackPool, SerializationEndpoint};
use super::model::PatchModel;
use super::protocol::{self, ClientMessage, CommandKind, Envelope, SerializationToClient};
use crate::bus::BusEffect;
use crate::group::GroupSettings;
use crate::status::EngineStatus;
use crate::{Error, Result};
use mosaic_core::SampleManager;
use mosaic_synth::RoutingEntry;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

/// Everything a handler may touch.
pub struct SerializationContext<'a> {
    pub model: &'a mut PatchModel,
    pub samples: &'a SampleManager,
    pub status: &'a EngineStatus,
    pub sample_rate: f32,
    endpoint: &'a mut SerializationEndpoint,
    callbacks: &'a mut CallbackPool,
    replies: &'a mut Vec<SerializationToClient>,
}

impl<'a> SerializationContext<'a> {
    pub(crate) fn new(
        model: &'a mut PatchModel,
        samples: &'a SampleManager,
        status: &'a EngineStatus,
        sample_rate: f32,
        endpoint: &'a mut SerializationEndpoint,
        callbacks: &'a mut CallbackPool,
        replies: &'a mut Vec<SerializationToClient>,
    ) -> Self {
        Self {
            model,
            samples,
            status,
            sample_rate,
            endpoint,
            callbacks,
            replies,
        }
    }

    pub fn reply(&mut self, message: SerializationToClient) {
        self.replies.push(message);
    }

    /// Queue a command for the audio thread.
    pub fn schedule(&mut self, command: AudioCommand) -> Result<()> {
        self.endpoint.schedule(command).map_err(|rejected| {
            tracing::warn!(command = ?rejected.kind(), "audio queue full, command dropped");
            Error::QueueFull
        })
    }

    /// Run `f` once on the audio thread at the start of the next block.
    pub fn schedule_callback<F>(&mut self, f: F) -> Result<()>
    where
        F: FnMut(&mut AudioContext<'_>) + Send + 'static,
    {
        let mut shell = self.callbacks.get_audio_thread_callback();
        shell.set(Box::new(f));
        match self.endpoint.schedule(AudioCommand::Callback(shell)) {
            Ok(()) => Ok(()),
            Err(AudioCommand::Callback(shell)) => {
                self.callbacks.return_audio_thread_callback(shell);
                Err(Error::QueueFull)
            }
            Err(_) => Err(Error::QueueFull),
        }
    }

    /// Rebuild a group's zone list from the model and send it to the audio thread.
    pub fn push_zones(&mut self, part: usize, group: usize) -> Result<()> {
        let zones = self.model.build_zones(part, group)?;
        self.schedule(AudioCommand::SwapZones { part, group, zones })
    }

    pub fn push_group_settings(&mut self, part: usize, group: usize) -> Result<()> {
        let settings = Box::new(self.model.group(part, group)?.settings);
        self.schedule(AudioCommand::SetGroup {
            part,
            group,
            settings,
        })
    }
}

pub type Handler = Box<dyn FnMut(&mut SerializationContext<'_>, &[u8]) -> Result<()> + Send>;

/// Message id -> handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<u16, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in message wired up.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_message(on_ping);
        registry.register_message(on_request_status);
        registry.register_message(on_load_sample);
        registry.register_message(on_add_zone);
        registry.register_message(on_remove_zone);
        registry.register_message(on_update_zone);
        registry.register_message(on_set_zone_routing);
        registry.register_message(on_set_group_routing);
        registry.register_message(on_set_group_output);
        registry.register_message(on_set_part);
        registry.register_message(on_set_bus);
        registry.register_message(on_set_bus_effect);
        registry.register_message(on_panic);
        registry.register_message(on_request_patch_summary);
        registry
    }

    /// Register a raw handler. Replaces any handler already at `id`.
    pub fn register(&mut self, id: u16, handler: Handler) {
        if self.handlers.insert(id, handler).is_some() {
            tracing::debug!(id, "handler replaced");
        }
    }

    /// Register a typed handler; the payload is decoded before the call.
    pub fn register_message<M, F>(&mut self, mut f: F)
    where
        M: ClientMessage + 'static,
        F: FnMut(&mut SerializationContext<'_>, M) -> Result<()> + Send + 'static,
    {
        self.register(
            M::ID,
            Box::new(move |context: &mut SerializationContext<'_>, payload: &[u8]| {
                let message = M::from_payload(payload)?;
                f(context, message)
            }),
        );
    }

    pub fn contains(&self, id: u16) -> bool {
        self.handlers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Decode one inbound message and run its handler. Errors and panics
    /// both become an `Error` reply.
    pub fn dispatch(&mut self, context: &mut SerializationContext<'_>, bytes: &[u8]) {
        let result = Envelope::decode(bytes).and_then(|envelope| {
            tracing::debug!(id = envelope.id, len = envelope.payload.len(), "dispatch");
            let handler = self
                .handlers
                .get_mut(&envelope.id)
                .ok_or(Error::UnknownMessage(envelope.id))?;
            match panic::catch_unwind(AssertUnwindSafe(|| handler(context, &envelope.payload))) {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(id = envelope.id, %message, "handler panicked");
                    Err(Error::InvalidParameter(format!("handler panicked: {message}")))
                }
            }
        });

        if let Err(e) = result {
            tracing::warn!(error = %e, "message rejected");
            context.reply(SerializationToClient::Error {
                message: e.to_string(),
            });
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.handlers.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("HandlerRegistry").field("ids", &ids).finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn on_ping(context: &mut SerializationContext<'_>, message: protocol::Ping) -> Result<()> {
    context.reply(SerializationToClient::Pong {
        nonce: message.nonce,
    });
    Ok(())
}

fn on_request_status(
    context: &mut SerializationContext<'_>,
    _: protocol::RequestStatus,
) -> Result<()> {
    let status = context.status.snapshot();
    context.reply(SerializationToClient::Status {
        active_voices: status.active_voices as u32,
        blocks_processed: status.blocks_processed,
        tail_samples: status.tail_samples as u64,
    });
    Ok(())
}

fn on_load_sample(context: &mut SerializationContext<'_>, message: protocol::LoadSample) -> Result<()> {
    let sample_id = context.samples.try_load_sample_by_path(&message.path)?;
    context.reply(SerializationToClient::SampleLoaded {
        sample_id,
        path: message.path,
    });
    Ok(())
}

fn on_add_zone(context: &mut SerializationContext<'_>, message: protocol::AddZone) -> Result<()> {
    let (part, group) = (message.part as usize, message.group as usize);
    context.model.add_zone(part, group, message.zone, context.samples)?;
    context.push_zones(part, group)
}

fn on_remove_zone(context: &mut SerializationContext<'_>, message: protocol::RemoveZone) -> Result<()> {
    let (part, group) = (message.part as usize, message.group as usize);
    context.model.remove_zone(part, group, message.zone as usize)?;
    context.push_zones(part, group)
}

fn on_update_zone(context: &mut SerializationContext<'_>, message: protocol::UpdateZone) -> Result<()> {
    let (part, group) = (message.part as usize, message.group as usize);
    context
        .model
        .update_zone(part, group, message.zone as usize, message.data)?;
    context.push_zones(part, group)
}

fn on_set_zone_routing(
    context: &mut SerializationContext<'_>,
    message: protocol::SetZoneRouting,
) -> Result<()> {
    let (part, group) = (message.part as usize, message.group as usize);
    let entry = RoutingEntry::try_from(message.route)?;
    context
        .model
        .zone_mut(part, group, message.zone as usize)?
        .data
        .routing
        .set(message.slot as usize, entry)?;
    context.push_zones(part, group)
}

fn on_set_group_routing(
    context: &mut SerializationContext<'_>,
    message: protocol::SetGroupRouting,
) -> Result<()> {
    let (part, group) = (message.part as usize, message.group as usize);
    let entry = RoutingEntry::try_from(message.route)?;
    context
        .model
        .group_mut(part, group)?
        .settings
        .routing
        .set(message.slot as usize, entry)?;
    context.push_group_settings(part, group)
}

fn on_set_group_output(
    context: &mut SerializationContext<'_>,
    message: protocol::SetGroupOutput,
) -> Result<()> {
    let (part, group) = (message.part as usize, message.group as usize);
    let settings = GroupSettings {
        volume_db: message.volume_db,
        pan: message.pan,
        mute: message.mute,
        ..context.model.group(part, group)?.settings
    };
    context.model.set_group_settings(part, group, settings)?;
    context.push_group_settings(part, group)
}

fn on_set_part(context: &mut SerializationContext<'_>, message: protocol::SetPart) -> Result<()> {
    let part = message.part as usize;
    context.model.part_mut(part)?.settings = message.settings;
    context.schedule(AudioCommand::SetPart {
        part,
        settings: message.settings,
    })
}

fn on_set_bus(context: &mut SerializationContext<'_>, message: protocol::SetBus) -> Result<()> {
    context.model.set_bus_settings(message.bus, message.settings)?;
    context.schedule(AudioCommand::SetBus {
        bus: message.bus,
        settings: message.settings,
    })
}

fn on_set_bus_effect(
    context: &mut SerializationContext<'_>,
    message: protocol::SetBusEffect,
) -> Result<()> {
    let slot = message.slot as usize;
    context.model.set_bus_effect(message.bus, slot, message.effect)?;
    let sample_rate = context.sample_rate;
    let effect = message
        .effect
        .map(|spec| Box::new(BusEffect::from_spec(&spec, sample_rate)));
    context.schedule(AudioCommand::SetBusEffect {
        bus: message.bus,
        slot,
        effect,
    })
}

fn on_panic(context: &mut SerializationContext<'_>, _: protocol::Panic) -> Result<()> {
    context.schedule(AudioCommand::Panic)
}

fn on_request_patch_summary(
    context: &mut SerializationContext<'_>,
    _: protocol::RequestPatchSummary,
) -> Result<()> {
    let parts = context.model.summary();
    context.reply(SerializationToClient::PatchSummary { parts });
    Ok(())
}

/// Reply, if any, for a message coming back from the audio thread.
pub(crate) fn audio_reply(kind: CommandKind) -> Option<SerializationToClient> {
    match kind {
        CommandKind::Callback => None,
        command => Some(SerializationToClient::Applied { command }),
    }
}
