//! Pitch and velocity curves.
//!
//! Pure functions shared by the voice engine and the render side. Velocity
//! inputs are clamped to the MIDI range before use, so every function is
//! total.

/// Note names within one octave, starting at C.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Convert MIDI note number to frequency in Hz.
/// A4 = 440 Hz = MIDI note 69
#[inline]
pub fn frequency_of(note: i32) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

#[inline]
fn normalized(velocity: i32) -> f32 {
    velocity.clamp(0, 127) as f32 / 127.0
}

/// Velocity to linear gain, shaped by a 1.5 power curve so mid velocities
/// land louder than a straight line would put them.
#[inline]
pub fn gain_of(velocity: i32) -> f32 {
    normalized(velocity).powf(1.5)
}

/// Velocity to low-pass cutoff: 800 Hz (soft) up to 8000 Hz (hard).
#[inline]
pub fn cutoff_of(velocity: i32) -> f32 {
    800.0 + normalized(velocity) * 7200.0
}

/// Scientific pitch label, e.g. `60 -> "C4"`, `69 -> "A4"`.
pub fn name_of(note: i32) -> String {
    let octave = note.div_euclid(12) - 1;
    let name = NOTE_NAMES[note.rem_euclid(12) as usize];
    format!("{name}{octave}")
}

/// Shift a frequency by `cents` (100 cents = 1 semitone).
#[inline]
pub fn detune(frequency: f32, cents: f32) -> f32 {
    if cents == 0.0 {
        frequency
    } else {
        frequency * 2.0_f32.powf(cents / 1200.0)
    }
}
