use crate::{
    constants::{FILTER_Q, PARTIALS},
    curves,
    dsp::{
        envelope::{Envelope, EnvelopeStage, EnvelopeTiming},
        filter::SVFilter,
        oscillator::OscillatorBlock,
    },
};

/// Identity of one triggered note.
///
/// A fresh id is minted for every trigger, so a deferred action aimed at an
/// old voice can never touch the voice that replaced it on the same note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(u64);

impl VoiceId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Free,      // Available for allocation
    Active,    // Playing, envelope in attack/decay/sustain
    Releasing, // Key released, envelope in release phase
}

struct PartialOsc {
    osc: OscillatorBlock,
    amplitude: f32,
}

/// One sounding piano note: three partials into a low-pass filter into an
/// envelope-controlled gain stage.
///
/// Voices live in a preallocated pool on the render side. `start` turns a
/// free slot into a new voice; it reaches `Free` again exactly at the frame
/// its release tail ends.
pub struct Voice {
    id: VoiceId,
    note: u8,
    velocity: u8,
    state: VoiceState,
    started_at: u64,
    stop_at: Option<u64>,
    sample_rate: f32,
    frequency: f32,
    partials: [PartialOsc; 3],
    filter: SVFilter,
    envelope: Envelope,
}

impl Voice {
    pub fn new(timing: EnvelopeTiming, sample_rate: f32) -> Self {
        let partials = PARTIALS.map(|partial| PartialOsc {
            osc: OscillatorBlock::new(partial.waveform),
            amplitude: 0.0,
        });

        Self {
            id: VoiceId::new(0),
            note: 0,
            velocity: 0,
            state: VoiceState::Free,
            started_at: 0,
            stop_at: None,
            sample_rate,
            frequency: 0.0,
            partials,
            filter: SVFilter::lowpass(curves::cutoff_of(0), FILTER_Q, sample_rate),
            envelope: Envelope::new(timing),
        }
    }

    /// Build the tone for `note` at `velocity` and trigger the envelope at
    /// frame `at`.
    pub fn start(&mut self, id: VoiceId, note: u8, velocity: u8, at: u64) {
        let note = note.min(127);
        let velocity = velocity.min(127);
        let frequency = curves::frequency_of(note as i32);
        let gain = curves::gain_of(velocity as i32);
        let cutoff = curves::cutoff_of(velocity as i32);

        for (slot, partial) in self.partials.iter_mut().zip(PARTIALS.iter()) {
            slot.osc.set_waveform(partial.waveform);
            slot.osc
                .set_frequency(curves::detune(frequency, partial.detune_cents), self.sample_rate);
            slot.osc.reset();
            slot.amplitude = partial.weight * gain;
        }

        self.filter.set_params(cutoff, FILTER_Q, self.sample_rate);
        self.filter.reset();

        self.envelope.reset();
        self.envelope.trigger(at, gain);

        self.id = id;
        self.note = note;
        self.velocity = velocity;
        self.frequency = frequency;
        self.started_at = at;
        self.stop_at = None;
        self.state = VoiceState::Active;
    }

    /// Begin the release tail at `at`. The partials stop at the same frame the
    /// envelope reaches zero, which is returned.
    pub fn release(&mut self, at: u64) -> Option<u64> {
        if self.state != VoiceState::Active {
            return self.stop_at;
        }

        let stop = self.envelope.release(at)?;
        self.stop_at = Some(stop);
        self.state = VoiceState::Releasing;
        Some(stop)
    }

    /// Add this voice's output for frames `first_frame..` into `out`.
    pub fn render(&mut self, out: &mut [f32], first_frame: u64) {
        if self.state == VoiceState::Free {
            return;
        }

        for (offset, sample) in out.iter_mut().enumerate() {
            let frame = first_frame + offset as u64;
            if frame < self.started_at {
                continue;
            }
            if self.stop_at.is_some_and(|stop| frame >= stop) {
                break;
            }

            let mut mix = 0.0;
            for partial in self.partials.iter_mut() {
                mix += partial.osc.next_sample() * partial.amplitude;
            }

            let filtered = self.filter.next_sample(mix);
            *sample += filtered * self.envelope.value_at(frame);
        }

        let block_end = first_frame + out.len() as u64;
        if self.stop_at.is_some_and(|stop| block_end >= stop) {
            self.free();
        }
    }

    /// True from `start` until the release tail is scheduled to end.
    pub fn is_active_at(&self, frame: u64) -> bool {
        self.state != VoiceState::Free && self.stop_at.is_none_or(|stop| frame < stop)
    }

    /// Drop all synthesis state. Safe to call repeatedly.
    pub fn free(&mut self) {
        if self.state == VoiceState::Free {
            return;
        }

        self.state = VoiceState::Free;
        self.stop_at = None;
        self.envelope.reset();
        self.filter.reset();
        for partial in self.partials.iter_mut() {
            partial.osc.reset();
            partial.amplitude = 0.0;
        }
    }

    pub fn is_free(&self) -> bool {
        self.state == VoiceState::Free
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    /// Frame the voice was triggered at; lower is older.
    pub fn age(&self) -> u64 {
        self.started_at
    }

    pub fn stop_at(&self) -> Option<u64> {
        self.stop_at
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn cutoff(&self) -> f32 {
        self.filter.cutoff()
    }

    pub fn peak_gain(&self) -> f32 {
        self.envelope.peak()
    }

    pub fn partial_amplitudes(&self) -> [f32; 3] {
        [
            self.partials[0].amplitude,
            self.partials[1].amplitude,
            self.partials[2].amplitude,
        ]
    }

    pub fn envelope_stage(&self, frame: u64) -> EnvelopeStage {
        self.envelope.stage_at(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Adsr;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn voice() -> Voice {
        Voice::new(
            EnvelopeTiming::from_adsr(&Adsr::piano(), SAMPLE_RATE),
            SAMPLE_RATE,
        )
    }

    fn peak(buffer: &[f32]) -> f32 {
        buffer.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }

    #[test]
    fn start_builds_partials_from_velocity() {
        let mut v = voice();
        v.start(VoiceId::new(1), 69, 127, 0);

        assert_eq!(v.state(), VoiceState::Active);
        assert!((v.frequency() - 440.0).abs() < 1e-3);
        assert!((v.cutoff() - 8_000.0).abs() < 1e-2);
        assert!((v.peak_gain() - 1.0).abs() < 1e-6);

        let [fundamental, octave, fifth] = v.partial_amplitudes();
        assert!((fundamental - 0.4).abs() < 1e-6);
        assert!((octave - 0.15).abs() < 1e-6);
        assert!((fifth - 0.08).abs() < 1e-6);
    }

    #[test]
    fn soft_velocity_is_darker_and_quieter() {
        let mut v = voice();
        v.start(VoiceId::new(1), 60, 32, 0);

        assert!(v.cutoff() < 3_000.0);
        assert!(v.peak_gain() < 0.2);
    }

    #[test]
    fn renders_signal_after_attack() {
        let mut v = voice();
        v.start(VoiceId::new(1), 60, 100, 0);

        let mut block = vec![0.0f32; 1_024];
        v.render(&mut block, 0);

        assert!(peak(&block) > 0.05);
        assert!(block.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn silent_before_its_start_frame() {
        let mut v = voice();
        v.start(VoiceId::new(1), 60, 100, 512);

        let mut block = vec![0.0f32; 1_024];
        v.render(&mut block, 0);

        assert!(block[..512].iter().all(|&s| s == 0.0));
        assert!(peak(&block[512..]) > 0.0);
    }

    #[test]
    fn release_stops_exactly_at_tail_end() {
        let mut v = voice();
        v.start(VoiceId::new(1), 60, 100, 0);

        let mut block = vec![0.0f32; 2_048];
        v.render(&mut block, 0);

        let stop = v.release(2_048).expect("active voice releases");
        assert_eq!(stop, 2_048 + 14_400);
        assert_eq!(v.state(), VoiceState::Releasing);
        assert!(v.is_active_at(stop - 1));
        assert!(!v.is_active_at(stop));

        // Render up to one frame before the stop on a block boundary.
        let mut frame = 2_048;
        while frame + 2_048 <= stop {
            block.fill(0.0);
            v.render(&mut block, frame);
            frame += 2_048;
        }
        assert!(!v.is_free());

        // The final block crosses the stop frame: nothing at or after it.
        block.fill(0.0);
        v.render(&mut block, frame);
        let stop_offset = (stop - frame) as usize;
        assert!(block[stop_offset..].iter().all(|&s| s == 0.0));
        assert!(v.is_free());
    }

    #[test]
    fn release_is_idempotent() {
        let mut v = voice();
        v.start(VoiceId::new(7), 60, 100, 0);

        let first = v.release(100);
        assert_eq!(v.release(5_000), first);
        assert_eq!(v.stop_at(), first);
    }

    #[test]
    fn free_is_idempotent() {
        let mut v = voice();
        v.start(VoiceId::new(1), 60, 100, 0);
        v.free();
        v.free();

        assert!(v.is_free());
        assert!(!v.is_active_at(0));

        let mut block = vec![0.0f32; 64];
        v.render(&mut block, 0);
        assert!(block.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn voices_render_independently() {
        let mut a = voice();
        let mut b = voice();
        a.start(VoiceId::new(1), 60, 100, 0);
        b.start(VoiceId::new(2), 64, 100, 0);

        let mut scratch = vec![0.0f32; 1_000];
        a.render(&mut scratch, 0);
        a.release(1_000);

        // Releasing one voice leaves the other in its decay.
        assert_eq!(b.envelope_stage(1_000), EnvelopeStage::Decay);
        assert_eq!(a.envelope_stage(1_000), EnvelopeStage::Release);
    }
}
