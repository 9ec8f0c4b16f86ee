use crate::{config::Adsr, dsp::ramp::LinearRamp};

/*
Scheduled ADSR Envelope
=======================

The envelope shapes a voice's amplitude over time. Unlike a free-running
per-sample state machine, every segment here is a `LinearRamp` placed on the
audio clock, so the level at any frame is a pure function of what has been
scheduled. The control side can schedule a release "at now" and the render
side evaluates exactly the same curve.

  Level
   peak ┐    ╱╲
        │   ╱  ╲___________
   S·pk │  ╱               ╲
        │ ╱                 ╲
    0.0 └╱───────────────────╲──→ frames
        start  A    D    (hold)  release_at → +R


Stages
------

    Idle ─trigger─→ Attack ─→ Decay ─→ Sustain
                      │         │         │
                      └─────── release ───┘
                                ↓
                             Release ─→ Done

trigger(start, peak)
    attack ramp   0 → peak         over A frames from `start`
    decay ramp    peak → peak·S    over D frames after the attack

release(at)
    Everything still scheduled after `at` is dropped. The instantaneous level
    at `at` (which may be mid-attack or mid-decay) becomes the origin of a
    ramp to 0 over R frames. Releasing again, or releasing an idle envelope,
    changes nothing.
*/

/// Envelope durations converted to frames at a given sample rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeTiming {
    pub attack: u64,
    pub decay: u64,
    pub sustain: f32,
    pub release: u64,
}

impl EnvelopeTiming {
    /// Segments are at least one frame long.
    pub fn from_adsr(adsr: &Adsr, sample_rate: f32) -> Self {
        Self {
            attack: seconds_to_frames(adsr.attack, sample_rate).max(1),
            decay: seconds_to_frames(adsr.decay, sample_rate).max(1),
            sustain: adsr.sustain.clamp(0.0, 1.0),
            release: seconds_to_frames(adsr.release, sample_rate).max(1),
        }
    }
}

pub(crate) fn seconds_to_frames(seconds: f32, sample_rate: f32) -> u64 {
    (seconds.max(0.0) * sample_rate).round() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
    Done,
}

pub struct Envelope {
    timing: EnvelopeTiming,
    start: Option<u64>,
    peak: f32,
    attack: LinearRamp,
    decay: LinearRamp,
    release: Option<LinearRamp>,
}

impl Envelope {
    pub fn new(timing: EnvelopeTiming) -> Self {
        Self {
            timing,
            start: None,
            peak: 0.0,
            attack: LinearRamp::hold(0.0),
            decay: LinearRamp::hold(0.0),
            release: None,
        }
    }

    /// Schedule attack and decay starting at `start`, rising to `peak`.
    ///
    /// Any previous schedule is discarded.
    pub fn trigger(&mut self, start: u64, peak: f32) {
        let sustain_level = peak * self.timing.sustain;
        let decay_start = start.saturating_add(self.timing.attack);

        self.start = Some(start);
        self.peak = peak;
        self.attack = LinearRamp::new(start, self.timing.attack, 0.0, peak);
        self.decay = LinearRamp::new(decay_start, self.timing.decay, peak, sustain_level);
        self.release = None;
    }

    /// Schedule the release at `at` and return the frame at which the level
    /// reaches zero.
    ///
    /// Returns the already scheduled end when called a second time, and
    /// `None` for an envelope that was never triggered.
    pub fn release(&mut self, at: u64) -> Option<u64> {
        let start = self.start?;
        if let Some(release) = &self.release {
            return Some(release.end());
        }

        let at = at.max(start);
        let from = self.held_value_at(at);
        let release = LinearRamp::new(at, self.timing.release, from, 0.0);
        self.release = Some(release);
        Some(release.end())
    }

    /// Level before any release is applied.
    #[inline]
    fn held_value_at(&self, frame: u64) -> f32 {
        match self.start {
            Some(start) if frame >= start => {
                if frame < self.decay.start() {
                    self.attack.value_at(frame)
                } else {
                    self.decay.value_at(frame)
                }
            }
            _ => 0.0,
        }
    }

    #[inline]
    pub fn value_at(&self, frame: u64) -> f32 {
        match &self.release {
            Some(release) if frame >= release.start() => release.value_at(frame),
            _ => self.held_value_at(frame),
        }
    }

    pub fn stage_at(&self, frame: u64) -> EnvelopeStage {
        let Some(start) = self.start else {
            return EnvelopeStage::Idle;
        };
        if frame < start {
            return EnvelopeStage::Idle;
        }

        if let Some(release) = &self.release {
            if frame >= release.end() {
                return EnvelopeStage::Done;
            }
            if frame >= release.start() {
                return EnvelopeStage::Release;
            }
        }

        if frame < self.attack.end() {
            EnvelopeStage::Attack
        } else if frame < self.decay.end() {
            EnvelopeStage::Decay
        } else {
            EnvelopeStage::Sustain
        }
    }

    /// Frame at which the release tail completes, once released.
    pub fn release_end(&self) -> Option<u64> {
        self.release.map(|r| r.end())
    }

    pub fn is_releasing(&self) -> bool {
        self.release.is_some()
    }

    pub fn peak(&self) -> f32 {
        self.peak
    }

    /// Back to idle with nothing scheduled.
    pub fn reset(&mut self) {
        *self = Self::new(self.timing);
    }
}
