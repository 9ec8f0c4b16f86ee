#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants;

/// Envelope timing shared by every voice of an engine.
///
/// Times are in seconds, `sustain` is a fraction of the velocity peak.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adsr {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Adsr {
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack,
            decay,
            sustain,
            release,
        }
    }

    pub fn piano() -> Self {
        Self::new(
            constants::ATTACK,
            constants::DECAY,
            constants::SUSTAIN,
            constants::RELEASE,
        )
    }
}

impl Default for Adsr {
    fn default() -> Self {
        Self::piano()
    }
}

/// Engine construction parameters.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Requested sample rate; the device may negotiate another.
    pub sample_rate: u32,
    pub max_voices: usize,
    pub master_volume: f32,
    /// Length of a master volume transition, in seconds.
    pub volume_ramp: f32,
    pub envelope: Adsr,
    pub queue_size: usize,
}

impl EngineConfig {
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_max_voices(mut self, max_voices: usize) -> Self {
        self.max_voices = max_voices;
        self
    }

    pub fn with_master_volume(mut self, volume: f32) -> Self {
        self.master_volume = volume;
        self
    }

    pub fn with_envelope(mut self, envelope: Adsr) -> Self {
        self.envelope = envelope;
        self
    }

    pub fn with_volume_ramp(mut self, seconds: f32) -> Self {
        self.volume_ramp = seconds;
        self
    }

    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    /// Clamp every field into its usable range.
    pub fn sanitized(mut self) -> Self {
        self.sample_rate = self.sample_rate.max(1);
        self.max_voices = self.max_voices.max(1);
        self.master_volume = clamp_unit(self.master_volume);
        self.volume_ramp = self.volume_ramp.max(0.0);
        self.envelope.attack = self.envelope.attack.max(0.0);
        self.envelope.decay = self.envelope.decay.max(0.0);
        self.envelope.sustain = clamp_unit(self.envelope.sustain);
        self.envelope.release = self.envelope.release.max(0.0);
        // Worst case per note event: release + steal + start.
        self.queue_size = self.queue_size.max(self.max_voices * 4);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: constants::SAMPLE_RATE,
            max_voices: constants::MAX_VOICES,
            master_volume: constants::MASTER_VOLUME,
            volume_ramp: constants::VOLUME_RAMP,
            envelope: Adsr::piano(),
            queue_size: constants::MESSAGE_QUEUE_SIZE,
        }
    }
}

/// Clamp to [0, 1], mapping NaN to silence.
pub(crate) fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
