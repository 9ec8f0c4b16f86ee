use std::f32::consts::TAU;

/*
Low-pass State-Variable Filter (TPT)
====================================

Each voice runs its partials through one low-pass filter whose cutoff tracks
the note's velocity: soft touches sound dark, hard touches bright. The cutoff
is fixed for the lifetime of a voice, so the coefficients are computed once
when the voice starts instead of per block.

  k = 1 / Q           damping (Q = 1 → k = 1, no resonant peak to speak of)
  g = tan(π fc / fs)  prewarped integrator gain

Per sample (Zavalishin's topology-preserving transform):

  h  = 1 / (1 + g(g + k))
  v1 = h (ic1 + g (x - ic2))      bandpass
  v2 = ic2 + g v1                 lowpass
  ic1 ← 2 v1 - ic1
  ic2 ← 2 v2 - ic2
*/

pub struct SVFilter {
    ic1eq: f32, // First integrator's memory
    ic2eq: f32, // Second integrator's memory

    cutoff_hz: f32,
    g: f32,
    k: f32,
    h: f32,
}

impl SVFilter {
    pub fn lowpass(cutoff_hz: f32, q: f32, sample_rate: f32) -> Self {
        let mut filter = Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            cutoff_hz,
            g: 0.0,
            k: 0.0,
            h: 0.0,
        };
        filter.set_params(cutoff_hz, q, sample_rate);
        filter
    }

    /// Recompute coefficients. Cutoff is kept below Nyquist to keep `tan`
    /// finite.
    pub fn set_params(&mut self, cutoff_hz: f32, q: f32, sample_rate: f32) {
        let cutoff_hz = cutoff_hz.clamp(1.0, sample_rate * 0.49);
        let q = q.max(0.01);

        let wd = TAU * cutoff_hz;
        let wa = (2.0 * sample_rate) * (wd / (2.0 * sample_rate)).tan();
        let g = wa / (2.0 * sample_rate);
        let k = 1.0 / q;

        self.cutoff_hz = cutoff_hz;
        self.g = g;
        self.k = k;
        self.h = 1.0 / (1.0 + g * (g + k));
    }

    #[inline]
    pub fn next_sample(&mut self, sample: f32) -> f32 {
        let v3 = sample - self.ic2eq;
        let v1 = self.h * (self.ic1eq + self.g * v3);
        let v2 = self.ic2eq + self.g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        v2
    }

    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff_hz
    }
}
