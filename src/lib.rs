pub mod config;
pub mod constants;
pub mod curves;
pub mod dsp; // Realtime-safe primitives: ramps, envelope, oscillator, filter
pub mod engine; // Voice Engine: note events, polyphony, cleanup
pub mod error;
pub mod io; // Audio clock, master bus, output devices
pub mod synth; // Render-side voices and voice pool

pub use config::{Adsr, EngineConfig};
pub use engine::{PianoEngine, VoiceInfo};
pub use error::{DeviceError, EngineError};

pub const MAX_BLOCK_SIZE: usize = 2048;
