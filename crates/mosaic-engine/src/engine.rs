//! The sampler engine: patch, voice pool and messaging in one owner.

use crate::bus::{BusAddress, BusEffect, BusEffectSpec, BusSettings};
use crate::builder::EngineBuilder;
use crate::group::GroupSettings;
use crate::messaging::{
    message_queues, AudioEndpoint, ClientHandle, ClientMessage, Handler, MessageController,
    PatchModel, SerializationContext, ZoneSpec,
};
use crate::part::PartSettings;
use crate::patch::{NoteOn, OutputBuffers, Patch};
use crate::pool::VoicePool;
use crate::status::EngineStatus;
use crate::{Error, Result};
use mosaic_core::{EngineConfig, SampleId, SampleManager, SampleRateContext, MAX_OUTPUTS, SILENT_BLOCK};
use mosaic_synth::AllocationStrategy;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// Polyphonic multi-sample engine.
///
/// Audio-thread entry points are [`note_on`](Self::note_on),
/// [`note_off`](Self::note_off) and [`process_audio`](Self::process_audio);
/// none of them allocate or lock. Edits made while audio runs go through a
/// [`ClientHandle`] to the serialization thread.
///
/// The `add_zone`/`set_*` methods edit the patch directly. They take
/// `&mut self`, lock the model and allocate, so they are for setup before
/// the engine moves to the audio thread, and for offline rendering.
///
/// # Example
///
/// ```ignore
/// use mosaic_engine::{Engine, ZoneSpec, SampleRef};
///
/// let mut engine = Engine::builder().sample_rate(48000.0).build()?;
/// let id = engine.load_sample("piano_c4.wav")?;
/// engine.add_zone(0, 0, ZoneSpec { data: Default::default(), sample: SampleRef::Id(id) })?;
///
/// engine.note_on(0, 60, -1, 0.8, 0.0);
/// let outputs = engine.process_audio();
/// ```
pub struct Engine {
    config: EngineConfig,
    context: SampleRateContext,
    patch: Patch,
    voices: VoicePool,
    audio: AudioEndpoint,
    outputs: OutputBuffers,
    status: Arc<EngineStatus>,
    samples: Arc<SampleManager>,
    model: Arc<Mutex<PatchModel>>,
    controller: MessageController,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub(crate) fn from_parts(
        config: EngineConfig,
        strategy: AllocationStrategy,
        samples: Arc<SampleManager>,
        handlers: Vec<(u16, Handler)>,
    ) -> Result<Self> {
        config.validate()?;
        let context = SampleRateContext::new(config.sample_rate);
        let (serial_end, audio_end) = message_queues(config.message_queue_capacity);
        let status = Arc::new(EngineStatus::new());
        let model = Arc::new(Mutex::new(PatchModel::new()));

        let mut controller = MessageController::new(
            serial_end,
            Arc::clone(&model),
            Arc::clone(&samples),
            Arc::clone(&status),
            config.sample_rate as f32,
            config.serialization_wait,
        );
        for (id, handler) in handlers {
            controller.register_handler(id, handler)?;
        }

        tracing::debug!(
            sample_rate = config.sample_rate,
            max_voices = config.max_voices,
            ?strategy,
            "engine created"
        );

        Ok(Self {
            patch: Patch::new(context),
            voices: VoicePool::new(config.max_voices, strategy, context),
            audio: audio_end,
            outputs: [SILENT_BLOCK; MAX_OUTPUTS],
            context,
            status,
            samples,
            model,
            controller,
            config,
        })
    }

    // --- audio thread ---

    /// Start voices for every matching zone. `velocity` is 0-1, `detune` in
    /// semitones. Returns the number of voices started.
    pub fn note_on(&mut self, channel: i16, key: u8, note_id: i32, velocity: f32, detune: f32) -> usize {
        self.patch.note_on(
            &mut self.voices,
            NoteOn {
                channel,
                key,
                note_id,
                velocity,
                detune,
            },
        )
    }

    /// Release voices started by the matching note-on. `note_id = -1` matches
    /// by key.
    pub fn note_off(&mut self, channel: i16, key: u8, note_id: i32, release_velocity: f32) {
        self.voices
            .release(channel, key, note_id, release_velocity.clamp(0.0, 1.0));
    }

    pub fn sustain_pedal(&mut self, channel: u8, on: bool) {
        self.voices.sustain_pedal(channel, on);
    }

    pub fn all_notes_off(&mut self) {
        self.voices.all_notes_off();
    }

    /// Fade out everything within one block.
    pub fn panic(&mut self) {
        self.patch.panic(&mut self.voices);
    }

    /// Render one block into `[output][channel][sample]`.
    pub fn process_audio(&mut self) -> &OutputBuffers {
        self.audio.drain(&mut self.patch, &mut self.voices);

        for output in self.outputs.iter_mut() {
            *output = SILENT_BLOCK;
        }
        self.patch.process(&mut self.voices, &mut self.outputs);
        self.voices.advance_time();

        let peak = self.outputs[0]
            .iter()
            .flatten()
            .fold(0.0f32, |peak, s| peak.max(s.abs()));
        self.status
            .publish(self.voices.active_count(), self.patch.tail_samples(), peak);
        &self.outputs
    }

    // --- setup ---

    /// Decode and store a sample through the sample manager.
    pub fn load_sample(&self, path: impl AsRef<Path>) -> Result<SampleId> {
        Ok(self.samples.try_load_sample_by_path(path.as_ref())?)
    }

    /// Append a zone. Returns the group's new zone count.
    pub fn add_zone(&mut self, part: usize, group: usize, spec: ZoneSpec) -> Result<usize> {
        let mut model = self.model.lock();
        let count = model.add_zone(part, group, spec, &self.samples)?;
        let zones = model.build_zones(part, group)?;
        drop(model);
        self.patch
            .group_mut(part, group)
            .ok_or(Error::InvalidGroup { part, group })?
            .zones = zones;
        Ok(count)
    }

    pub fn remove_zone(&mut self, part: usize, group: usize, zone: usize) -> Result<()> {
        let mut model = self.model.lock();
        model.remove_zone(part, group, zone)?;
        let zones = model.build_zones(part, group)?;
        drop(model);
        self.patch
            .group_mut(part, group)
            .ok_or(Error::InvalidGroup { part, group })?
            .zones = zones;
        Ok(())
    }

    pub fn set_group(&mut self, part: usize, group: usize, settings: GroupSettings) -> Result<()> {
        let mut settings = self.model.lock().set_group_settings(part, group, settings)?;
        self.patch
            .group_mut(part, group)
            .ok_or(Error::InvalidGroup { part, group })?
            .swap_settings(&mut settings);
        Ok(())
    }

    pub fn set_part(&mut self, part: usize, settings: PartSettings) -> Result<()> {
        self.model.lock().part_mut(part)?.settings = settings;
        self.patch.part_mut(part).ok_or(Error::InvalidPart(part))?.settings = settings;
        Ok(())
    }

    pub fn set_bus(&mut self, bus: BusAddress, settings: BusSettings) -> Result<()> {
        self.model.lock().set_bus_settings(bus, settings)?;
        self.patch
            .bus_mut(bus)
            .ok_or_else(|| Error::InvalidBus(bus.to_string()))?
            .set_settings(settings);
        Ok(())
    }

    pub fn set_bus_effect(&mut self, bus: BusAddress, slot: usize, effect: Option<BusEffectSpec>) -> Result<()> {
        self.model.lock().set_bus_effect(bus, slot, effect)?;
        let sample_rate = self.context.sample_rate() as f32;
        let effect = effect.map(|spec| Box::new(BusEffect::from_spec(&spec, sample_rate)));
        self.patch
            .bus_mut(bus)
            .ok_or_else(|| Error::InvalidBus(bus.to_string()))?
            .replace_effect(slot, effect)
            .map_err(|_| Error::InvalidEffectSlot(slot))?;
        Ok(())
    }

    // --- messaging ---

    pub fn client(&self) -> ClientHandle {
        self.controller.client()
    }

    /// Spawn the serialization thread.
    pub fn start(&mut self) -> Result<()> {
        self.controller.start()
    }

    pub fn stop(&mut self) {
        self.controller.stop();
    }

    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    pub fn register_handler(&mut self, id: u16, handler: Handler) -> Result<()> {
        self.controller.register_handler(id, handler)
    }

    pub fn register_message<M, F>(&mut self, f: F) -> Result<()>
    where
        M: ClientMessage + 'static,
        F: FnMut(&mut SerializationContext<'_>, M) -> Result<()> + Send + 'static,
    {
        self.controller.register_message(f)
    }

    /// Run the serialization loop body on this thread until the inbound
    /// queue is empty. Only while the thread is not running.
    pub fn pump_messages(&mut self) -> Result<usize> {
        self.controller.pump()
    }

    // --- accessors ---

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.context.sample_rate()
    }

    pub fn samples(&self) -> &Arc<SampleManager> {
        &self.samples
    }

    pub fn status(&self) -> &Arc<EngineStatus> {
        &self.status
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    pub fn voices(&self) -> &VoicePool {
        &self.voices
    }

    pub fn active_voices(&self) -> usize {
        self.voices.active_count()
    }

    /// Samples until the output is silent, as of the last block.
    pub fn tail_samples(&self) -> usize {
        self.patch.tail_samples()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("sample_rate", &self.config.sample_rate)
            .field("active_voices", &self.voices.active_count())
            .field("controller", &self.controller)
            .finish()
    }
}
