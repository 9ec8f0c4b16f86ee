use crate::{
    dsp::envelope::EnvelopeTiming,
    synth::voice::{Voice, VoiceId, VoiceState},
};

/// Render-side voice pool.
///
/// Every voice is allocated up front, so starting a note never allocates on
/// the audio thread. The pool is larger than the engine's polyphony ceiling
/// because voices evicted from the active table still play out their release
/// tails here.
pub struct PolySynth {
    voices: Vec<Voice>,
}

impl PolySynth {
    pub fn new(pool_size: usize, timing: EnvelopeTiming, sample_rate: f32) -> Self {
        let voices = (0..pool_size.max(1))
            .map(|_| Voice::new(timing, sample_rate))
            .collect();

        Self { voices }
    }

    pub fn note_on(&mut self, id: VoiceId, note: u8, velocity: u8, at: u64) {
        let voice = self.allocate_voice();
        voice.start(id, note, velocity, at);
    }

    pub fn note_off(&mut self, id: VoiceId, at: u64) -> Option<u64> {
        self.find_voice(id).and_then(|voice| voice.release(at))
    }

    pub fn all_notes_off(&mut self, at: u64) {
        for voice in &mut self.voices {
            if voice.state() == VoiceState::Active {
                voice.release(at);
            }
        }
    }

    /// Sum every sounding voice into `out`, which is cleared first.
    pub fn render_block(&mut self, out: &mut [f32], first_frame: u64) {
        out.fill(0.0);
        for voice in &mut self.voices {
            if !voice.is_free() {
                voice.render(out, first_frame);
            }
        }
    }

    fn allocate_voice(&mut self) -> &mut Voice {
        // First pass: find free voice index
        let free_idx = self.voices.iter().position(|v| v.is_free());

        // Second pass: steal the release tail that ends first, then the
        // oldest voice of all
        let idx = free_idx
            .or_else(|| {
                self.voices
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.state() == VoiceState::Releasing)
                    .min_by_key(|(_, v)| v.stop_at())
                    .map(|(idx, _)| idx)
            })
            .or_else(|| {
                self.voices
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, v)| v.age())
                    .map(|(idx, _)| idx)
            })
            .unwrap_or(0);

        &mut self.voices[idx]
    }

    fn find_voice(&mut self, id: VoiceId) -> Option<&mut Voice> {
        self.voices
            .iter_mut()
            .find(|v| v.id() == id && !v.is_free())
    }

    pub fn voice(&self, id: VoiceId) -> Option<&Voice> {
        self.voices.iter().find(|v| v.id() == id && !v.is_free())
    }

    pub fn active_count(&self, frame: u64) -> usize {
        self.voices.iter().filter(|v| v.is_active_at(frame)).count()
    }

    pub fn capacity(&self) -> usize {
        self.voices.len()
    }
}
