//! Voice Engine: the control surface of the tone generator.
//!
//! Every method runs on the caller's thread, returns immediately, and only
//! schedules work on the audio clock. Sample rendering happens in the output
//! device's callback, fed through the bus message queue.

pub mod allocator;
pub mod scheduler;

use crate::{
    config::{clamp_unit, EngineConfig},
    constants::DEFAULT_VELOCITY,
    curves,
    dsp::envelope::EnvelopeTiming,
    error::Result,
    io::{
        bus::OutputBus,
        device::{AudioBackend, CpalBackend, DeviceManager},
    },
    synth::{message::BusMessage, voice::VoiceId},
};

use self::{
    allocator::{ActiveVoice, VoiceTable},
    scheduler::Scheduler,
};

/// Diagnostic snapshot of a registered voice.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceInfo {
    pub id: VoiceId,
    pub note: u8,
    pub name: String,
    pub velocity: u8,
    pub frequency: f32,
    pub cutoff_hz: f32,
    pub peak_gain: f32,
    pub started_at: f64,
    pub releasing: bool,
}

/// State that exists only once the output is open.
struct Runtime {
    bus: OutputBus,
    table: VoiceTable,
    cleanup: Scheduler,
    release_frames: u64,
    next_voice: u64,
}

impl Runtime {
    fn now(&self) -> u64 {
        self.bus.clock().now()
    }

    /// Frame that events sent now are scheduled at.
    fn at(&self) -> u64 {
        self.bus.clock().schedule_point()
    }

    fn mint_id(&mut self) -> VoiceId {
        self.next_voice += 1;
        VoiceId::new(self.next_voice)
    }

    /// Flush held bus messages, then drop table entries whose release tails
    /// have elapsed.
    fn reap(&mut self) {
        self.bus.flush();
        let now = self.now();
        let Runtime { table, cleanup, .. } = self;
        cleanup.tick(now, |id| {
            if let Some(voice) = table.remove_voice(id) {
                tracing::trace!(note = voice.note, voice = id.raw(), "voice cleaned up");
            }
        });
    }

    /// Record the release of `voice` at `at` and queue its cleanup; returns
    /// false if it was already releasing.
    fn mark_released(
        cleanup: &mut Scheduler,
        voice: &mut ActiveVoice,
        at: u64,
        release_frames: u64,
    ) -> bool {
        if voice.is_releasing() {
            return false;
        }

        let end = at.saturating_add(release_frames);
        voice.release_end = Some(end);
        cleanup.enqueue(voice.id, end);
        true
    }

    fn release(
        bus: &mut OutputBus,
        cleanup: &mut Scheduler,
        voice: &mut ActiveVoice,
        at: u64,
        release_frames: u64,
    ) -> bool {
        let released = Self::mark_released(cleanup, voice, at, release_frames);
        if released {
            bus.send(BusMessage::NoteOff { voice: voice.id, at });
        }
        released
    }
}

/// Polyphonic piano engine.
///
/// Generic over the output backend so tests can drive it with an
/// [`OfflineBackend`](crate::io::OfflineBackend); the default talks to the
/// system output through cpal.
pub struct PianoEngine<B: AudioBackend = CpalBackend> {
    config: EngineConfig,
    device: DeviceManager<B>,
    runtime: Option<Runtime>,
}

impl PianoEngine<CpalBackend> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_backend(config, CpalBackend::new())
    }
}

impl<B: AudioBackend> PianoEngine<B> {
    pub fn with_backend(config: EngineConfig, backend: B) -> Self {
        Self {
            config: config.sanitized(),
            device: DeviceManager::new(backend),
            runtime: None,
        }
    }

    /// Open the output and start the render stage. Calling again once
    /// initialized does nothing. A failure leaves the engine uninitialized so
    /// the caller can retry.
    pub fn initialize(&mut self) -> Result<()> {
        if self.runtime.is_some() {
            tracing::debug!("engine already initialized");
            return Ok(());
        }

        let bus = self.device.open(&self.config)?;
        let timing = EnvelopeTiming::from_adsr(&self.config.envelope, bus.clock().sample_rate());

        self.runtime = Some(Runtime {
            bus,
            table: VoiceTable::new(self.config.max_voices),
            cleanup: Scheduler::with_capacity(self.config.max_voices * 2),
            release_frames: timing.release,
            next_voice: 0,
        });

        tracing::info!(max_voices = self.config.max_voices, "piano engine initialized");
        Ok(())
    }

    fn runtime_mut(&mut self, op: &'static str) -> Option<&mut Runtime> {
        if self.runtime.is_none() {
            tracing::warn!(op, "engine not initialized; ignoring");
        }
        self.runtime.as_mut()
    }

    /// Resume a suspended output, e.g. from a user gesture handler.
    pub fn resume(&mut self) {
        if let Err(err) = self.device.resume() {
            tracing::warn!(%err, "failed to resume output");
        }
    }

    /// Trigger `note`, replacing any voice already sounding it. At the
    /// polyphony ceiling the oldest registered voice is released to make room.
    pub fn play_note(&mut self, note: u8, velocity: u8) {
        if self.runtime.is_some() {
            self.resume();
        }
        let Some(rt) = self.runtime_mut("play_note") else {
            return;
        };

        let note = note.min(127);
        let velocity = velocity.min(127);

        rt.reap();
        let at = rt.at();
        let release_frames = rt.release_frames;

        // Stop the old voice before scheduling the new one so the renderer
        // sees them in order.
        if let Some(mut old) = rt.table.remove(note) {
            Runtime::release(&mut rt.bus, &mut rt.cleanup, &mut old, at, release_frames);
            tracing::debug!(note, voice = old.id.raw(), "retriggering note");
        }

        let id = rt.mint_id();
        if let Some(mut evicted) = rt.table.admit(ActiveVoice::new(id, note, velocity, at)) {
            Runtime::release(&mut rt.bus, &mut rt.cleanup, &mut evicted, at, release_frames);
            tracing::debug!(
                stolen = evicted.note,
                note,
                "polyphony ceiling reached, stealing oldest voice"
            );
        }

        rt.bus.send(BusMessage::NoteOn {
            voice: id,
            note,
            velocity,
            at,
        });
        tracing::debug!(note, velocity, voice = id.raw(), "note on");
    }

    /// [`play_note`](Self::play_note) at the default velocity.
    pub fn play(&mut self, note: u8) {
        self.play_note(note, DEFAULT_VELOCITY);
    }

    /// Release `note`'s voice. It keeps its polyphony slot until the release
    /// tail has elapsed. Does nothing if the note is not sounding.
    pub fn stop_note(&mut self, note: u8) {
        let Some(rt) = self.runtime_mut("stop_note") else {
            return;
        };

        rt.reap();
        let at = rt.at();
        let Runtime {
            bus,
            table,
            cleanup,
            release_frames,
            ..
        } = rt;

        match table.get_mut(note.min(127)) {
            Some(voice) => {
                if Runtime::release(bus, cleanup, voice, at, *release_frames) {
                    tracing::debug!(note, voice = voice.id.raw(), "note off");
                }
            }
            None => tracing::trace!(note, "note off for silent note"),
        }
    }

    /// Release every registered voice. Voices already releasing keep their
    /// original tail.
    pub fn stop_all_notes(&mut self) {
        let Some(rt) = self.runtime_mut("stop_all_notes") else {
            return;
        };

        rt.reap();
        let at = rt.at();
        let Runtime {
            bus,
            table,
            cleanup,
            release_frames,
            ..
        } = rt;

        let mut released = 0;
        for voice in table.iter_mut() {
            if Runtime::mark_released(cleanup, voice, at, *release_frames) {
                released += 1;
            }
        }
        if released > 0 {
            bus.send(BusMessage::AllNotesOff { at });
        }
        tracing::debug!(released, "all notes off");
    }

    /// Smoothly retarget the master gain; `volume` is clamped to [0, 1].
    pub fn set_master_volume(&mut self, volume: f32) {
        let Some(rt) = self.runtime_mut("set_master_volume") else {
            return;
        };

        let volume = clamp_unit(volume);
        rt.reap();
        rt.bus.set_master_volume(volume);
        tracing::debug!(volume, "master volume");
    }

    /// Flush held queue messages and run cleanup that has come due. Every
    /// control call does this too.
    pub fn maintain(&mut self) {
        if let Some(rt) = self.runtime.as_mut() {
            rt.reap();
        }
    }

    pub fn is_note_active(&self, note: u8) -> bool {
        self.runtime.as_ref().is_some_and(|rt| {
            let now = rt.now();
            rt.table.get(note.min(127)).is_some_and(|v| v.is_active(now))
        })
    }

    /// Voices whose release tail has not yet completed.
    pub fn active_voice_count(&self) -> usize {
        self.runtime.as_ref().map_or(0, |rt| {
            let now = rt.now();
            rt.table.iter().filter(|v| v.is_active(now)).count()
        })
    }

    /// Sounding notes, oldest first.
    pub fn active_notes(&self) -> Vec<u8> {
        self.runtime.as_ref().map_or_else(Vec::new, |rt| {
            let now = rt.now();
            rt.table
                .iter()
                .filter(|v| v.is_active(now))
                .map(|v| v.note)
                .collect()
        })
    }

    pub fn voice_info(&self, note: u8) -> Option<VoiceInfo> {
        let rt = self.runtime.as_ref()?;
        let now = rt.now();
        let voice = rt.table.get(note.min(127)).filter(|v| v.is_active(now))?;
        let velocity = voice.velocity as i32;

        Some(VoiceInfo {
            id: voice.id,
            note: voice.note,
            name: curves::name_of(voice.note as i32),
            velocity: voice.velocity,
            frequency: curves::frequency_of(voice.note as i32),
            cutoff_hz: curves::cutoff_of(velocity),
            peak_gain: curves::gain_of(velocity),
            started_at: voice.created_at as f64 / rt.bus.clock().sample_rate() as f64,
            releasing: voice.is_releasing(),
        })
    }

    /// Target of the latest volume change, or the configured initial volume.
    pub fn master_volume(&self) -> f32 {
        self.runtime
            .as_ref()
            .map_or(self.config.master_volume, |rt| rt.bus.master_volume())
    }

    /// Instantaneous smoothed master gain.
    pub fn master_gain(&self) -> f32 {
        self.runtime
            .as_ref()
            .map_or(self.config.master_volume, |rt| rt.bus.master_gain())
    }

    /// Audio clock in seconds; zero before initialization.
    pub fn current_time(&self) -> f64 {
        self.runtime.as_ref().map_or(0.0, |rt| rt.bus.clock().seconds())
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.device.info().map(|info| info.sample_rate)
    }

    pub fn is_initialized(&self) -> bool {
        self.runtime.is_some()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Entries in the Active Voice Table, releasing or not, until cleanup.
    pub fn registered_voice_count(&self) -> usize {
        self.runtime.as_ref().map_or(0, |rt| rt.table.len())
    }
}
