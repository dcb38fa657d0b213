//! Three-thread messaging: audio, serialization, client.
//!
//! - The **client** thread (any thread holding a [`ClientHandle`]) encodes
//!   a message, pushes the bytes onto a mutex-guarded queue and signals a
//!   condvar. Replies come back through a registered callback.
//! - The **serialization** thread, owned by [`MessageController`], handles
//!   one inbound message per wake-up, schedules [`AudioCommand`]s and drains
//!   whatever the audio thread sent back.
//! - The **audio** thread drains its command queue at the top of every block
//!   through an [`AudioEndpoint`] and never blocks.

pub mod audio;
pub mod handlers;
pub mod model;
pub mod protocol;
mod thread;

pub use audio::{
    message_queues, AudioCallback, AudioCommand, AudioContext, AudioEndpoint, AudioFn,
    AudioToSerialization, CallbackPool, SerializationEndpoint,
};
pub use handlers::{Handler, HandlerRegistry, SerializationContext};
pub use model::PatchModel;
pub use protocol::{ClientMessage, CommandKind, Envelope, SerializationToClient, ZoneSpec};
pub use thread::ReplyCallback;

use crate::status::EngineStatus;
use crate::{Error, Result};
use mosaic_core::SampleManager;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thread::{serialization_loop, Inbound, SerializationWorker};

/// Shell count the callback free list starts with.
const CALLBACK_POOL_SIZE: usize = 32;

/// Cloneable sender usable from any thread.
#[derive(Clone)]
pub struct ClientHandle {
    inbound: Arc<Inbound>,
}

impl ClientHandle {
    pub fn send<M: ClientMessage>(&self, message: &M) -> Result<()> {
        let bytes = message.to_envelope()?.encode()?;
        self.inbound.push(bytes);
        Ok(())
    }

    /// Send a message with an arbitrary id (custom handlers).
    pub fn send_raw(&self, id: u16, payload: Vec<u8>) -> Result<()> {
        let bytes = Envelope { id, payload }.encode()?;
        self.inbound.push(bytes);
        Ok(())
    }

    /// Push already encoded envelope bytes.
    pub fn send_bytes(&self, bytes: Vec<u8>) {
        self.inbound.push(bytes);
    }

    /// Register where replies go. Called on the serialization thread with
    /// the encoded [`SerializationToClient`].
    pub fn set_reply_callback(&self, callback: impl Fn(&[u8]) + Send + Sync + 'static) {
        self.inbound.state.lock().reply_callback = Some(Arc::new(callback));
    }

    pub fn clear_reply_callback(&self) {
        self.inbound.state.lock().reply_callback = None;
    }

    /// Inbound messages not yet picked up.
    pub fn pending(&self) -> usize {
        self.inbound.state.lock().queue.len()
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Owner of the serialization thread.
pub struct MessageController {
    inbound: Arc<Inbound>,
    shutdown: Arc<AtomicBool>,
    worker: Option<SerializationWorker>,
    thread_handle: Option<JoinHandle<SerializationWorker>>,
}

impl MessageController {
    pub(crate) fn new(
        endpoint: SerializationEndpoint,
        model: Arc<Mutex<PatchModel>>,
        samples: Arc<SampleManager>,
        status: Arc<EngineStatus>,
        sample_rate: f32,
        wait: Duration,
    ) -> Self {
        let inbound = Arc::new(Inbound::default());
        let worker = SerializationWorker {
            inbound: Arc::clone(&inbound),
            handlers: HandlerRegistry::with_builtins(),
            model,
            samples,
            status,
            endpoint,
            callbacks: CallbackPool::new(CALLBACK_POOL_SIZE),
            sample_rate,
            wait,
        };
        Self {
            inbound,
            shutdown: Arc::new(AtomicBool::new(false)),
            worker: Some(worker),
            thread_handle: None,
        }
    }

    pub fn client(&self) -> ClientHandle {
        ClientHandle {
            inbound: Arc::clone(&self.inbound),
        }
    }

    /// Register a handler for `id`. Only before [`start`](Self::start).
    pub fn register_handler(&mut self, id: u16, handler: Handler) -> Result<()> {
        let worker = self.worker.as_mut().ok_or(Error::AlreadyStarted)?;
        worker.handlers.register(id, handler);
        Ok(())
    }

    /// Typed variant of [`register_handler`](Self::register_handler).
    pub fn register_message<M, F>(&mut self, f: F) -> Result<()>
    where
        M: ClientMessage + 'static,
        F: FnMut(&mut SerializationContext<'_>, M) -> Result<()> + Send + 'static,
    {
        let worker = self.worker.as_mut().ok_or(Error::AlreadyStarted)?;
        worker.handlers.register_message(f);
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        let worker = self.worker.take().ok_or(Error::AlreadyStarted)?;
        self.shutdown.store(false, Ordering::Release);
        let shutdown = Arc::clone(&self.shutdown);

        // A failed spawn drops the worker; the controller cannot restart.
        let handle = std::thread::Builder::new()
            .name("mosaic-serialization".into())
            .spawn(move || serialization_loop(worker, shutdown))
            .map_err(Error::ThreadSpawn)?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Signal shutdown and join. Messages still queued stay queued.
    pub fn stop(&mut self) {
        let Some(handle) = self.thread_handle.take() else {
            return;
        };
        self.shutdown.store(true, Ordering::Release);
        self.inbound.wake();
        match handle.join() {
            Ok(worker) => self.worker = Some(worker),
            Err(_) => tracing::error!("serialization thread panicked"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }

    /// Handle queued messages on the calling thread until the inbound queue
    /// is empty, including ones sent while pumping, then drain the audio
    /// queue once more. For offline use while the thread is not running.
    /// Returns the number of messages handled.
    pub fn pump(&mut self) -> Result<usize> {
        let worker = self.worker.as_mut().ok_or(Error::AlreadyStarted)?;
        let idle = AtomicBool::new(false);
        let mut handled = 0;
        while !worker.inbound.state.lock().queue.is_empty() {
            worker.step(&idle, false);
            handled += 1;
        }
        if handled == 0 {
            worker.step(&idle, false);
        }
        Ok(handled)
    }
}

impl Drop for MessageController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for MessageController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageController")
            .field("running", &self.is_running())
            .finish()
    }
}
