//! Low-level DSP primitives used by the voices and the output bus.
//!
//! These components are allocation-free and realtime-safe, making them safe to
//! embed directly inside voice structs. Time-varying parameters are expressed
//! as segments on the audio clock so they can be scheduled ahead of rendering.

/// Scheduled attack/decay/sustain/release envelope.
pub mod envelope;
/// Low-pass state-variable filter.
pub mod filter;
/// Sine and triangle oscillators.
pub mod oscillator;
/// Frame-indexed linear parameter ramps.
pub mod ramp;

pub use envelope::{Envelope, EnvelopeStage, EnvelopeTiming};
pub use ramp::LinearRamp;
