//! Numerically controlled oscillator used to shift the tuned channel to baseband.
//!
//! Phase is kept in cycles `[0, 1)` as an `f64` and the oscillator sample is
//! computed from it directly, so there is no recursive rotation that drifts in
//! amplitude or phase over long runs.

use std::f64::consts::TAU;

use rustfft::num_complex::Complex;

/// Down-converting mixer at a normalized frequency (cycles/sample)
#[derive(Debug, Clone, PartialEq)]
pub struct Nco {
    phase: f64,
    frequency: f64,
}

impl Nco {
    pub fn new(frequency: f64) -> Self {
        Self {
            phase: 0.0,
            frequency,
        }
    }

    /// Change frequency without touching the phase accumulator, so the mixed
    /// signal stays continuous across the retune.
    pub fn retune(&mut self, frequency: f64) {
        self.frequency = frequency;
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Current phase in cycles
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Multiply the samples in place by `exp(-j 2 pi f n)`.
    pub fn mix(&mut self, data: &mut [Complex<f32>]) {
        if self.frequency == 0.0 {
            return;
        }
        for sample in data.iter_mut() {
            let (sin, cos) = (TAU * self.phase).sin_cos();
            let lo = Complex::new(cos as f32, -sin as f32);
            *sample *= lo;

            self.phase += self.frequency;
            self.phase -= self.phase.floor();
        }
    }
}
