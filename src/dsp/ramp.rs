/// A straight-line parameter segment on the audio clock.
///
/// The value is `from` up to `start`, interpolates linearly until `end`,
/// and holds `to` afterwards. Evaluating it is a pure function of the frame
/// position, so the control side and the render side agree on the value at
/// any instant without sharing state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearRamp {
    start: u64,
    end: u64,
    from: f32,
    to: f32,
}

impl LinearRamp {
    pub fn new(start: u64, frames: u64, from: f32, to: f32) -> Self {
        Self {
            start,
            end: start.saturating_add(frames),
            from,
            to,
        }
    }

    /// A constant value, settled since frame zero.
    pub fn hold(value: f32) -> Self {
        Self::new(0, 0, value, value)
    }

    #[inline]
    pub fn value_at(&self, frame: u64) -> f32 {
        if frame >= self.end {
            return self.to;
        }
        if frame <= self.start {
            return self.from;
        }

        let progress = (frame - self.start) as f64 / (self.end - self.start) as f64;
        self.from + (self.to - self.from) * progress as f32
    }

    /// Supersede this ramp at `at`: drop whatever was still scheduled and
    /// ramp from the value held at that instant to `target`.
    pub fn retarget(&mut self, at: u64, frames: u64, target: f32) {
        let from = self.value_at(at);
        *self = Self::new(at, frames, from, target);
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn target(&self) -> f32 {
        self.to
    }
}
