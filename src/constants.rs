//! Fixed engine-wide constants.

use crate::dsp::oscillator::Waveform;

/// Preferred output sample rate. The device may negotiate a different one.
pub const SAMPLE_RATE: u32 = 48_000;

/// Polyphony ceiling of the Active Voice Table.
pub const MAX_VOICES: usize = 32;

/// Master gain applied before the first `set_master_volume` call.
pub const MASTER_VOLUME: f32 = 0.5;

/// Velocity used when the caller does not supply one.
pub const DEFAULT_VELOCITY: u8 = 100;

/// Duration of every master volume transition, in seconds.
pub const VOLUME_RAMP: f32 = 0.05;

// ADSR timing, in seconds (sustain is a fraction of peak).
pub const ATTACK: f32 = 0.01;
pub const DECAY: f32 = 0.1;
pub const SUSTAIN: f32 = 0.7;
pub const RELEASE: f32 = 0.3;

/// Quality factor of the per-voice tone filter.
pub const FILTER_Q: f32 = 1.0;

/// Capacity of the control → render message ring.
pub const MESSAGE_QUEUE_SIZE: usize = 1024;

/// One oscillator component of a piano voice.
#[derive(Debug, Clone, Copy)]
pub struct Partial {
    pub waveform: Waveform,
    pub detune_cents: f32,
    pub weight: f32,
}

/// Fundamental, octave, and fifth above the octave.
pub const PARTIALS: [Partial; 3] = [
    Partial {
        waveform: Waveform::Triangle,
        detune_cents: 0.0,
        weight: 0.4,
    },
    Partial {
        waveform: Waveform::Sine,
        detune_cents: 1200.0,
        weight: 0.15,
    },
    Partial {
        waveform: Waveform::Sine,
        detune_cents: 1902.0,
        weight: 0.08,
    },
];
