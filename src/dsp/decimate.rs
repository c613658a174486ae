//! Keep-one-in-N downsampling with a phase that survives block boundaries.
//!
//! Filtering happens upstream in [`super::fft_filter`]; this block only picks
//! samples.

use rustfft::num_complex::Complex;

#[derive(Debug, Clone, PartialEq)]
pub struct Decimator {
    factor: usize,
    /// Samples to skip before the next kept one
    countdown: usize,
}

impl Decimator {
    /// # Panics
    /// Panics if `factor` is 0.
    pub fn new(factor: usize) -> Self {
        assert!(factor > 0, "Decimation factor must be greater than 0");
        Self {
            factor,
            countdown: 0,
        }
    }

    /// Index within the next block of the first sample that will be kept
    pub fn next_keep(&self) -> usize {
        self.countdown
    }

    /// Append every `factor`-th sample of `input` to `out`.
    pub fn process(&mut self, input: &[Complex<f32>], out: &mut Vec<Complex<f32>>) {
        let n = input.len();
        if self.countdown >= n {
            self.countdown -= n;
            return;
        }
        out.extend(input[self.countdown..].iter().step_by(self.factor).copied());

        let last_kept = self.countdown + (n - 1 - self.countdown) / self.factor * self.factor;
        self.countdown = last_kept + self.factor - n;
    }
}
