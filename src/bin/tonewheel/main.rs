//! tonewheel - play a short progression on the default output device
//!
//! Run with: cargo run
//! Set RUST_LOG=tonewheel=debug to watch note events and voice stealing.

use std::{thread, time::Duration};

use color_eyre::eyre::{Result as EyreResult, WrapErr};
use tonewheel::{curves, EngineConfig, PianoEngine};
use tracing_subscriber::EnvFilter;

// C major, A minor, F major, G major
const PROGRESSION: [[u8; 4]; 4] = [
    [48, 60, 64, 67],
    [45, 57, 60, 64],
    [41, 57, 60, 65],
    [43, 55, 59, 62],
];

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut engine = PianoEngine::new(EngineConfig::default());
    engine
        .initialize()
        .wrap_err("failed to open audio output")?;

    println!("=== tonewheel ===");
    if let Some(rate) = engine.sample_rate() {
        println!("Sample rate: {} Hz", rate);
    }
    println!("Polyphony: {} voices", engine.config().max_voices);
    println!();

    for chord in PROGRESSION {
        let names: Vec<String> = chord.iter().map(|&n| curves::name_of(n as i32)).collect();
        println!("  {}", names.join(" "));

        // Roll the chord like a pianist, bass note hardest.
        for (i, &note) in chord.iter().enumerate() {
            engine.play_note(note, 110 - i as u8 * 12);
            thread::sleep(Duration::from_millis(30));
        }
        thread::sleep(Duration::from_millis(700));

        for &note in &chord[1..] {
            engine.stop_note(note);
        }
        thread::sleep(Duration::from_millis(150));
        engine.stop_note(chord[0]);
    }

    // Fade out with a final high arpeggio over the release tails.
    for &note in &[72u8, 76, 79, 84] {
        engine.play(note);
        thread::sleep(Duration::from_millis(120));
    }
    engine.set_master_volume(0.2);
    thread::sleep(Duration::from_millis(600));

    engine.stop_all_notes();
    println!();
    println!("Active voices after stop: {}", engine.active_voice_count());
    thread::sleep(Duration::from_millis(400));
    println!("Active voices after release: {}", engine.active_voice_count());

    Ok(())
}
