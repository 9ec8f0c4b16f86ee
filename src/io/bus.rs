use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::{
    config::{clamp_unit, EngineConfig},
    dsp::{envelope::EnvelopeTiming, ramp::LinearRamp},
    io::clock::AudioClock,
    synth::{
        message::{BusMessage, MessageReceiver},
        poly::PolySynth,
    },
    MAX_BLOCK_SIZE,
};

/*
Output Bus
==========

The master bus is split across the two threads:

  control thread                       audio callback
  ──────────────                       ──────────────
  OutputBus ── BusMessage (rtrb SPSC) ──→ BusRenderer
    pending notes (if the ring is full)    PolySynth (voice pool)
    gain target ──── AtomicU32 ─────────→  master gain ramp
    gain mirror                            AudioClock writer

Note events go through the ring and are never dropped: when it is full they
wait on the control side and are flushed, in order, on the next send or
`flush`. The master volume is only ever the latest target, so it is a single
atomic value. The renderer starts a new ramp at the first block that sees a
changed target; the control side mirrors that ramp from the clock's schedule
point so it can report the smoothed gain. Volume changes supersede each
other: each one starts from the gain held at that instant.
*/

/// Build a connected control/render pair for one engine.
pub fn channel(config: &EngineConfig, clock: AudioClock) -> (OutputBus, BusRenderer) {
    let sample_rate = clock.sample_rate();
    let timing = EnvelopeTiming::from_adsr(&config.envelope, sample_rate);
    let ramp_frames = clock.frames_for(config.volume_ramp);
    let initial = clamp_unit(config.master_volume);
    let target = Arc::new(AtomicU32::new(initial.to_bits()));
    let (tx, rx) = RingBuffer::<BusMessage>::new(config.queue_size.max(1));

    let bus = OutputBus {
        tx,
        pending: VecDeque::new(),
        target: Arc::clone(&target),
        gain: LinearRamp::hold(initial),
        ramp_frames,
        clock: clock.clone(),
    };

    let renderer = BusRenderer {
        rx,
        synth: PolySynth::new(config.max_voices * 2, timing, sample_rate),
        target,
        gain: LinearRamp::hold(initial),
        ramp_frames,
        clock,
        scratch: vec![0.0; MAX_BLOCK_SIZE],
    };

    (bus, renderer)
}

/// Control-side handle to the master bus.
pub struct OutputBus {
    tx: Producer<BusMessage>,
    pending: VecDeque<BusMessage>,
    target: Arc<AtomicU32>,
    gain: LinearRamp,
    ramp_frames: u64,
    clock: AudioClock,
}

impl OutputBus {
    /// Queue a message for the render stage, after anything still pending.
    pub fn send(&mut self, msg: BusMessage) {
        if self.flush() > 0 {
            self.pending.push_back(msg);
            return;
        }

        if let Err(PushError::Full(msg)) = self.tx.push(msg) {
            tracing::warn!(?msg, "render queue full, holding messages until it drains");
            self.pending.push_back(msg);
        }
    }

    /// Move pending messages into the ring while it has room. Returns how
    /// many are still waiting.
    pub fn flush(&mut self) -> usize {
        while let Some(&msg) = self.pending.front() {
            if self.tx.push(msg).is_err() {
                break;
            }
            self.pending.pop_front();
        }
        self.pending.len()
    }

    pub fn pending_messages(&self) -> usize {
        self.pending.len()
    }

    /// Ramp the master gain to `volume` (clamped to [0, 1]) over the fixed
    /// ramp time, starting from whatever gain is held right now.
    pub fn set_master_volume(&mut self, volume: f32) {
        let target = clamp_unit(volume);
        let at = self.clock.schedule_point();

        self.gain.retarget(at, self.ramp_frames, target);
        self.target.store(target.to_bits(), Ordering::Relaxed);
    }

    /// The clamped target of the latest volume change.
    pub fn master_volume(&self) -> f32 {
        self.gain.target()
    }

    /// Instantaneous master gain, mid-ramp if a transition is running.
    pub fn master_gain(&self) -> f32 {
        self.gain.value_at(self.clock.now())
    }

    pub fn ramp_deadline(&self) -> u64 {
        self.gain.end()
    }

    pub fn clock(&self) -> &AudioClock {
        &self.clock
    }
}

/// Render stage of the master bus, owned by the audio callback.
///
/// Never allocates, locks, or logs.
pub struct BusRenderer<R = Consumer<BusMessage>> {
    rx: R,
    synth: PolySynth,
    target: Arc<AtomicU32>,
    gain: LinearRamp,
    ramp_frames: u64,
    clock: AudioClock,
    scratch: Vec<f32>,
}

impl<R: MessageReceiver> BusRenderer<R> {
    fn apply_messages(&mut self, block_start: u64) {
        while let Some(msg) = self.rx.pop() {
            // Late messages land on the first frame not yet rendered.
            match msg {
                BusMessage::NoteOn {
                    voice,
                    note,
                    velocity,
                    at,
                } => self.synth.note_on(voice, note, velocity, at.max(block_start)),
                BusMessage::NoteOff { voice, at } => {
                    self.synth.note_off(voice, at.max(block_start));
                }
                BusMessage::AllNotesOff { at } => self.synth.all_notes_off(at.max(block_start)),
            }
        }

        let target = f32::from_bits(self.target.load(Ordering::Relaxed));
        if target.to_bits() != self.gain.target().to_bits() {
            self.gain.retarget(block_start, self.ramp_frames, target);
        }
    }

    /// Render mono output into `out` and advance the clock by its length.
    pub fn render_block(&mut self, out: &mut [f32]) {
        let block_start = self.clock.now();
        self.apply_messages(block_start);

        let mut frame = block_start;
        for chunk in out.chunks_mut(MAX_BLOCK_SIZE) {
            self.synth.render_block(chunk, frame);
            for (offset, sample) in chunk.iter_mut().enumerate() {
                *sample *= self.gain.value_at(frame + offset as u64);
            }
            frame += chunk.len() as u64;
        }

        self.clock.advance(out.len() as u64);
    }

    /// Render into an interleaved device buffer, duplicating mono to every
    /// channel.
    pub fn render_interleaved(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let total_frames = data.len() / channels;
        let mut scratch = std::mem::take(&mut self.scratch);
        let mut frames_written = 0;

        while frames_written < total_frames {
            let frames_remaining = total_frames - frames_written;
            let frames_to_render = frames_remaining.min(scratch.len().max(1));

            let block = &mut scratch[..frames_to_render];
            self.render_block(block);

            let out_off = frames_written * channels;
            for (i, &s) in block.iter().enumerate() {
                for ch in 0..channels {
                    data[out_off + i * channels + ch] = s;
                }
            }

            frames_written += frames_to_render;
        }

        self.scratch = scratch;
    }

    pub fn synth(&self) -> &PolySynth {
        &self.synth
    }

    pub fn gain(&self) -> &LinearRamp {
        &self.gain
    }

    pub fn clock(&self) -> &AudioClock {
        &self.clock
    }
}
