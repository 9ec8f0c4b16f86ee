use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::dsp::envelope::seconds_to_frames;

/// Monotonic audio clock: the number of frames the render stage has produced.
///
/// The render callback is the only writer. Control code reads it as "now"
/// and schedules every parameter change against it.
#[derive(Debug, Clone)]
pub struct AudioClock {
    frames: Arc<AtomicU64>,
    lookahead: Arc<AtomicU64>,
    sample_rate: f32,
}

impl AudioClock {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            lookahead: Arc::new(AtomicU64::new(0)),
            sample_rate,
        }
    }

    #[inline]
    pub fn now(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Earliest frame a message sent now is guaranteed to reach on time.
    ///
    /// A device renders a whole callback before the clock moves, so anything
    /// queued mid-callback is first seen one callback later.
    #[inline]
    pub fn schedule_point(&self) -> u64 {
        self.now()
            .saturating_add(self.lookahead.load(Ordering::Relaxed))
    }

    /// Current time in seconds.
    pub fn seconds(&self) -> f64 {
        self.now() as f64 / self.sample_rate as f64
    }

    pub(crate) fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::Release);
    }

    /// Record the device callback size. Pull-driven backends leave it at 0.
    pub(crate) fn set_lookahead(&self, frames: u64) {
        self.lookahead.store(frames, Ordering::Relaxed);
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn frames_for(&self, seconds: f32) -> u64 {
        seconds_to_frames(seconds, self.sample_rate)
    }
}
