use tonewheel::{
    constants::{MAX_VOICES, RELEASE},
    io::{OfflineBackend, OfflineHandle},
    EngineConfig, PianoEngine,
};

const SAMPLE_RATE: u32 = 48_000;

fn engine_with(config: EngineConfig) -> (PianoEngine<OfflineBackend>, OfflineHandle) {
    let backend = OfflineBackend::new(SAMPLE_RATE);
    let handle = backend.handle();
    let mut engine = PianoEngine::with_backend(config, backend);
    engine.initialize().expect("offline backend always opens");
    (engine, handle)
}

fn engine() -> (PianoEngine<OfflineBackend>, OfflineHandle) {
    engine_with(EngineConfig::default())
}

/// Power of `frequency` in `samples` (Goertzel).
fn tone_power(samples: &[f32], frequency: f32) -> f32 {
    let omega = 2.0 * std::f32::consts::PI * frequency / SAMPLE_RATE as f32;
    let coeff = 2.0 * omega.cos();
    let (mut s1, mut s2) = (0.0f32, 0.0f32);
    for &x in samples {
        let s0 = x + coeff * s1 - s2;
        s2 = s1;
        s1 = s0;
    }
    s1 * s1 + s2 * s2 - coeff * s1 * s2
}

fn rms(samples: &[f32]) -> f32 {
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len().max(1) as f32).sqrt()
}

#[test]
fn note_is_active_until_release_tail_elapses() {
    let (mut engine, handle) = engine();

    engine.play_note(60, 100);
    assert!(engine.is_note_active(60));

    engine.stop_note(60);
    assert!(engine.is_note_active(60), "still sounding during release");

    handle.advance(RELEASE + 0.005);
    assert!(!engine.is_note_active(60));
    assert_eq!(engine.active_voice_count(), 0);
}

#[test]
fn polyphony_ceiling_steals_oldest() {
    let (mut engine, _handle) = engine();

    for note in 0..=MAX_VOICES as u8 {
        engine.play_note(30 + note, 100);
        assert!(engine.registered_voice_count() <= MAX_VOICES);
    }

    assert_eq!(engine.active_voice_count(), MAX_VOICES);
    assert!(!engine.is_note_active(30), "earliest note was evicted");
    assert!(engine.is_note_active(31));
    assert!(engine.is_note_active(30 + MAX_VOICES as u8));

    let notes = engine.active_notes();
    assert_eq!(notes.first(), Some(&31));
    assert_eq!(notes.last(), Some(&(30 + MAX_VOICES as u8)));
}

#[test]
fn releasing_voices_still_count_toward_polyphony() {
    let (mut engine, _handle) =
        engine_with(EngineConfig::default().with_max_voices(2));

    engine.play_note(60, 100);
    engine.stop_note(60);
    engine.play_note(62, 100);
    engine.play_note(64, 100);

    // 60 was releasing but still held a slot, so it was the one stolen.
    assert!(!engine.is_note_active(60));
    assert_eq!(engine.active_notes(), vec![62, 64]);
}

#[test]
fn double_trigger_leaves_one_voice() {
    let (mut engine, handle) = engine();

    engine.play_note(60, 100);
    engine.play_note(60, 100);

    assert_eq!(engine.active_voice_count(), 1);
    handle.advance(0.05);
    assert_eq!(engine.active_voice_count(), 1);
}

#[test]
fn master_volume_is_clamped() {
    let (mut engine, _handle) = engine();

    engine.set_master_volume(1.5);
    assert_eq!(engine.master_volume(), 1.0);

    engine.set_master_volume(-0.2);
    assert_eq!(engine.master_volume(), 0.0);
}

#[test]
fn master_volume_ramps_without_steps() {
    let (mut engine, handle) = engine();
    assert_eq!(engine.master_gain(), 0.5);

    engine.set_master_volume(1.0);
    assert_eq!(engine.master_gain(), 0.5, "no jump at the instant of change");

    handle.advance(0.025);
    let mid = engine.master_gain();
    assert!(mid > 0.7 && mid < 0.8, "got {mid}");

    handle.advance(0.03);
    assert_eq!(engine.master_gain(), 1.0);
}

#[test]
fn stopping_silent_note_is_no_op() {
    let (mut engine, _handle) = engine();
    engine.stop_note(60);
    engine.stop_note(127);
    assert_eq!(engine.active_voice_count(), 0);
}

#[test]
fn stop_all_notes_waits_for_every_tail() {
    let (mut engine, handle) = engine();
    for note in [60, 64, 67] {
        engine.play_note(note, 100);
    }

    engine.stop_note(60);
    handle.advance(0.1);
    engine.stop_all_notes();

    // 60 keeps its earlier deadline, the rest started releasing 100 ms later.
    handle.advance(0.21);
    assert!(!engine.is_note_active(60));
    assert!(engine.is_note_active(64));
    assert!(engine.is_note_active(67));

    handle.advance(0.1);
    assert_eq!(engine.active_voice_count(), 0);
    engine.maintain();
    assert_eq!(engine.registered_voice_count(), 0);
}

#[test]
fn rendered_audio_follows_note_lifecycle() {
    let (mut engine, handle) = engine();

    let silence = handle.render(1_024);
    assert!(silence.iter().all(|&s| s == 0.0));

    engine.play_note(60, 100);
    let held = handle.render(4_800);
    assert!(rms(&held) > 0.001);

    engine.stop_note(60);
    let frames = (RELEASE * SAMPLE_RATE as f32) as usize;
    let tail = handle.render(frames);
    assert!(rms(&tail[..1_000]) > rms(&tail[frames - 1_000..]));

    let after = handle.render(1_024);
    assert!(after.iter().all(|&s| s == 0.0), "silent once the tail ends");
}

#[test]
fn end_to_end_a4_at_full_velocity() {
    let (mut engine, handle) = engine();

    engine.play_note(69, 127);
    let info = engine.voice_info(69).expect("A4 sounding");
    assert!((info.frequency - 440.0).abs() < 0.01);
    assert!((info.cutoff_hz - 8_000.0).abs() < 0.1);

    // Skip the attack/decay, then look at a sustained window.
    handle.render(6_000);
    let window = handle.render(9_600);
    let fundamental = tone_power(&window, 440.0);
    assert!(fundamental > tone_power(&window, 880.0));
    assert!(fundamental > tone_power(&window, 1_318.5));
    assert!(fundamental > 100.0 * tone_power(&window, 300.0));

    engine.stop_note(69);
    handle.advance(RELEASE + 0.01);
    assert_eq!(engine.active_voice_count(), 0);
}

#[test]
fn stereo_output_carries_mono_mix() {
    let backend = OfflineBackend::new(SAMPLE_RATE).with_channels(2);
    let handle = backend.handle();
    let mut engine = PianoEngine::with_backend(EngineConfig::default(), backend);
    engine.initialize().expect("opens");

    engine.play_note(64, 100);
    let data = handle.render(2_048);
    assert_eq!(data.len(), 4_096);
    assert!(data.chunks(2).all(|frame| frame[0] == frame[1]));
}

#[test]
fn note_storm_stays_bounded() {
    let (mut engine, handle) = engine();

    for round in 0..20u8 {
        for note in 0..64u8 {
            engine.play_note(note.wrapping_mul(7).wrapping_add(round) % 128, 127);
        }
        let block = handle.render(256);
        assert!(block.iter().all(|s| s.is_finite()));
        assert!(engine.registered_voice_count() <= MAX_VOICES);
    }
}

#[test]
fn clock_reports_seconds() {
    let (engine, handle) = engine();
    handle.advance(0.5);
    assert!((engine.current_time() - 0.5).abs() < 1e-6);
}

#[test]
fn immediate_stop_is_ordered_after_start() {
    let (mut engine, handle) = engine();

    engine.play_note(60, 100);
    engine.stop_note(60);

    let frames = (RELEASE * SAMPLE_RATE as f32) as usize;
    let tail = handle.render(frames);
    assert!(tail.iter().all(|s| s.is_finite()));

    let after = handle.render(4_096);
    assert!(after.iter().all(|&s| s == 0.0), "note off must not precede its note on");
    assert_eq!(engine.active_voice_count(), 0);
}

#[test]
fn short_note_fades_then_falls_silent() {
    let (mut engine, handle) = engine();

    engine.play_note(60, 100);
    let held = handle.render(960);
    engine.stop_note(60);

    let frames = (RELEASE * SAMPLE_RATE as f32) as usize;
    let tail = handle.render(frames);
    assert!(rms(&held[480..]) > 0.001);
    assert!(rms(&tail[..2_000]) > rms(&tail[frames - 2_000..]));

    let after = handle.render(4_096);
    assert!(after.iter().all(|&s| s == 0.0));
}

#[test]
fn volume_flood_does_not_swallow_note_off() {
    let (mut engine, handle) = engine();

    for i in 0..1_022 {
        engine.set_master_volume((i % 2) as f32);
    }
    engine.play_note(60, 127);
    engine.stop_note(60);

    handle.advance(1.0);
    let after = handle.render(4_096);
    assert!(after.iter().all(|&s| s == 0.0));
    assert!(!engine.is_note_active(60));
}

#[test]
fn saturated_queue_delivers_every_note_event() {
    let (mut engine, handle) = engine_with(EngineConfig::default().with_queue_size(0));

    // Far more events than the queue holds, with nothing rendered between.
    for i in 0..400u32 {
        let note = (36 + i % 48) as u8;
        engine.play_note(note, 100);
        engine.stop_note(note);
    }

    for _ in 0..20 {
        handle.render(512);
        engine.maintain();
    }
    handle.advance(RELEASE + 0.1);
    engine.maintain();

    let after = handle.render(4_096);
    assert!(after.iter().all(|&s| s == 0.0), "no note left hanging");
    assert_eq!(engine.active_voice_count(), 0);
    assert_eq!(engine.registered_voice_count(), 0);
}
