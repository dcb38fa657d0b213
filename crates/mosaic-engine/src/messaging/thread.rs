//! The serialization thread loop.

use super::audio::{AudioToSerialization, CallbackPool, SerializationEndpoint};
use super::handlers::{audio_reply, HandlerRegistry, SerializationContext};
use super::model::PatchModel;
use super::protocol::{CommandKind, SerializationToClient};
use crate::status::EngineStatus;
use mosaic_core::SampleManager;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Reply sink registered by the client. Invoked on the serialization thread.
pub type ReplyCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

#[derive(Default)]
pub(crate) struct InboundState {
    pub queue: VecDeque<Vec<u8>>,
    pub reply_callback: Option<ReplyCallback>,
}

/// Client -> serialization queue. The mutex guards only the queue and the
/// callback registration.
#[derive(Default)]
pub(crate) struct Inbound {
    pub state: Mutex<InboundState>,
    pub signal: Condvar,
}

impl Inbound {
    pub fn push(&self, bytes: Vec<u8>) {
        self.state.lock().queue.push_back(bytes);
        self.signal.notify_one();
    }

    pub fn wake(&self) {
        let _guard = self.state.lock();
        self.signal.notify_all();
    }
}

/// State owned by the serialization thread while it runs.
pub(crate) struct SerializationWorker {
    pub inbound: Arc<Inbound>,
    pub handlers: HandlerRegistry,
    pub model: Arc<Mutex<PatchModel>>,
    pub samples: Arc<SampleManager>,
    pub status: Arc<EngineStatus>,
    pub endpoint: SerializationEndpoint,
    pub callbacks: CallbackPool,
    pub sample_rate: f32,
    pub wait: Duration,
}

impl SerializationWorker {
    /// One loop iteration: wait for (at most) one inbound message, handle
    /// it, then drain everything the audio thread sent back. Returns `false`
    /// once shutdown was requested.
    pub fn step(&mut self, shutdown: &AtomicBool, block: bool) -> bool {
        let (message, callback) = {
            let mut state = self.inbound.state.lock();
            if block && state.queue.is_empty() && !shutdown.load(Ordering::Acquire) {
                let _ = self.inbound.signal.wait_for(&mut state, self.wait);
            }
            if shutdown.load(Ordering::Acquire) {
                return false;
            }
            (state.queue.pop_front(), state.reply_callback.clone())
        };

        let mut replies = Vec::new();
        if let Some(bytes) = message {
            let mut model = self.model.lock();
            let mut context = SerializationContext::new(
                &mut model,
                &self.samples,
                &self.status,
                self.sample_rate,
                &mut self.endpoint,
                &mut self.callbacks,
                &mut replies,
            );
            self.handlers.dispatch(&mut context, &bytes);
        }
        self.drain_audio(&mut replies);

        if let Some(callback) = callback {
            for reply in &replies {
                match reply.encode() {
                    Ok(bytes) => callback(&bytes),
                    Err(e) => tracing::warn!(error = %e, "reply encode failed"),
                }
            }
        }
        true
    }

    /// Everything the audio thread handed back is dropped here.
    fn drain_audio(&mut self, replies: &mut Vec<SerializationToClient>) {
        while let Some(event) = self.endpoint.try_recv() {
            tracing::trace!(?event, "from audio");
            match event {
                AudioToSerialization::ZonesSwapped {
                    part,
                    group,
                    zone_count,
                    retired,
                } => {
                    drop(retired);
                    replies.push(SerializationToClient::ZonesChanged {
                        part: part as u8,
                        group: group as u8,
                        zone_count: zone_count as u32,
                    });
                }
                AudioToSerialization::GroupUpdated { previous, .. } => {
                    drop(previous);
                    replies.extend(audio_reply(CommandKind::Group));
                }
                AudioToSerialization::EffectReplaced { previous, .. } => {
                    drop(previous);
                    replies.extend(audio_reply(CommandKind::BusEffect));
                }
                AudioToSerialization::Applied(kind) => replies.extend(audio_reply(kind)),
                AudioToSerialization::CallbackReturned(shell) => {
                    self.callbacks.return_audio_thread_callback(shell);
                }
            }
        }
    }
}

pub(crate) fn serialization_loop(mut worker: SerializationWorker, shutdown: Arc<AtomicBool>) -> SerializationWorker {
    tracing::info!("serialization thread started");
    while worker.step(&shutdown, true) {}
    tracing::info!("serialization thread stopped");
    worker
}
