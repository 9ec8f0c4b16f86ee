use std::f32::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Waveform shapes available to a voice partial.
///
/// Sine: a single frequency, no harmonics.
/// Triangle: odd harmonics falling off as 1/n², soft and mellow.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
}

/// Phase-accumulator oscillator.
///
/// Phase is kept in [0, 1) cycles. Both waveforms start at zero and rise,
/// so a freshly reset oscillator never begins with a step.
pub struct OscillatorBlock {
    waveform: Waveform,
    phase: f32,
    increment: f32,
}

impl OscillatorBlock {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            waveform,
            phase: 0.0,
            increment: 0.0,
        }
    }

    pub fn sine() -> Self {
        Self::new(Waveform::Sine)
    }

    pub fn triangle() -> Self {
        Self::new(Waveform::Triangle)
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    /// Frequency is fixed per note, so the per-sample phase step is
    /// computed once here instead of in the render loop.
    pub fn set_frequency(&mut self, frequency: f32, sample_rate: f32) {
        self.increment = frequency / sample_rate;
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let value = match self.waveform {
            Waveform::Sine => (TAU * self.phase).sin(),
            Waveform::Triangle => {
                let t = (self.phase + 0.75).fract();
                4.0 * (t - 0.5).abs() - 1.0
            }
        };

        self.phase += self.increment;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }

        value
    }

    pub fn render(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.next_sample();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising_zero_crossings(buffer: &[f32]) -> usize {
        buffer
            .windows(2)
            .filter(|pair| pair[0] < 0.0 && pair[1] >= 0.0)
            .count()
    }

    #[test]
    fn valid_sine() {
        let sample_rate = 48_000.0;
        let frequency = 440.0;
        let mut osc = OscillatorBlock::sine();
        osc.set_frequency(frequency, sample_rate);

        let mut buffer = vec![0.0f32; 128];
        osc.render(&mut buffer);

        // sample n should be sin(2pi f n / sr)
        let sample_index = 12;
        let expected = (TAU * frequency * sample_index as f32 / sample_rate).sin();
        let actual = buffer[sample_index];
        assert!(
            (actual - expected).abs() < 1e-4,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn triangle_starts_at_zero_and_peaks_at_quarter_cycle() {
        let mut osc = OscillatorBlock::triangle();
        // 4 samples per cycle
        osc.set_frequency(1.0, 4.0);

        let mut buffer = [0.0f32; 4];
        osc.render(&mut buffer);

        assert!(buffer[0].abs() < 1e-6);
        assert!((buffer[1] - 1.0).abs() < 1e-6);
        assert!(buffer[2].abs() < 1e-6);
        assert!((buffer[3] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn one_second_of_a4_has_440_cycles() {
        let sample_rate = 48_000.0;
        for waveform in [Waveform::Sine, Waveform::Triangle] {
            let mut osc = OscillatorBlock::new(waveform);
            osc.set_frequency(440.0, sample_rate);

            let mut buffer = vec![0.0f32; sample_rate as usize];
            osc.render(&mut buffer);

            let cycles = rising_zero_crossings(&buffer);
            assert!(
                (439..=441).contains(&cycles),
                "{waveform:?}: counted {cycles} cycles"
            );
        }
    }

    #[test]
    fn output_stays_in_unit_range() {
        let mut osc = OscillatorBlock::triangle();
        osc.set_frequency(3_333.0, 48_000.0);
        let mut buffer = vec![0.0f32; 4_096];
        osc.render(&mut buffer);
        assert!(buffer.iter().all(|s| (-1.0..=1.0).contains(s)));
    }
}
