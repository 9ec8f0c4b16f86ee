// Purpose: render-side voices and polyphony
// This layer owns the synthesis state; the engine only schedules it.

pub mod message;
pub mod poly;
pub mod voice;

pub use voice::{Voice, VoiceId, VoiceState};
