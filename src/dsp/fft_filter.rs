//! Overlap-save FIR filtering for a continuous stream.
//!
//! Each segment is `block_size` long: the last `taps - 1` input samples of
//! the previous call followed by up to `block_size - taps + 1` new samples.
//! Outputs whose support lies entirely inside the segment are free of
//! circular wrap, so concatenating the results of any sequence of calls gives
//! exactly the linear convolution of the whole stream. A short final segment
//! is zero padded; the padding sits after every kept output and does not
//! affect them, which is why each call returns as many samples as it received.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::design::FilterState;

pub struct FftFilter {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    /// Filter spectrum, pre-scaled by 1/N for the unnormalized inverse
    response: Vec<Complex<f32>>,
    history: Vec<Complex<f32>>,
    segment: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    num_taps: usize,
}

impl FftFilter {
    pub fn new(filter: &FilterState) -> Self {
        Self::with_taps(filter.taps(), filter.block_size())
    }

    /// Build from raw taps. `block_size` must be at least `2 * taps.len()`.
    pub fn with_taps(taps: &[f64], block_size: usize) -> Self {
        assert!(!taps.is_empty(), "filter needs at least one tap");
        assert!(
            block_size >= taps.len() * 2,
            "block size {block_size} too small for {} taps",
            taps.len()
        );

        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(block_size);
        let inverse = planner.plan_fft_inverse(block_size);

        let scale = 1.0 / block_size as f32;
        let mut response: Vec<Complex<f32>> = taps
            .iter()
            .map(|&t| Complex::new(t as f32 * scale, 0.0))
            .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
            .take(block_size)
            .collect();
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        let mut scratch = vec![Complex::new(0.0, 0.0); scratch_len];
        forward.process_with_scratch(&mut response, &mut scratch);

        Self {
            forward,
            inverse,
            response,
            history: vec![Complex::new(0.0, 0.0); taps.len() - 1],
            segment: vec![Complex::new(0.0, 0.0); block_size],
            scratch,
            num_taps: taps.len(),
        }
    }

    pub fn num_taps(&self) -> usize {
        self.num_taps
    }

    pub fn block_size(&self) -> usize {
        self.segment.len()
    }

    /// New samples consumed per full segment
    pub fn step(&self) -> usize {
        self.segment.len() - self.history.len()
    }

    /// Overlap carried into the next call
    pub fn history(&self) -> &[Complex<f32>] {
        &self.history
    }

    /// Filter `input`, appending exactly `input.len()` samples to `out`.
    pub fn process(&mut self, input: &[Complex<f32>], out: &mut Vec<Complex<f32>>) {
        let overlap = self.history.len();
        out.reserve(input.len());

        for chunk in input.chunks(self.step()) {
            let n = chunk.len();
            self.segment[..overlap].copy_from_slice(&self.history);
            self.segment[overlap..overlap + n].copy_from_slice(chunk);
            self.segment[overlap + n..].fill(Complex::new(0.0, 0.0));

            self.forward
                .process_with_scratch(&mut self.segment, &mut self.scratch);
            for (s, h) in self.segment.iter_mut().zip(self.response.iter()) {
                *s *= *h;
            }
            self.inverse
                .process_with_scratch(&mut self.segment, &mut self.scratch);
            out.extend_from_slice(&self.segment[overlap..overlap + n]);

            if n >= overlap {
                self.history.copy_from_slice(&chunk[n - overlap..]);
            } else {
                self.history.rotate_left(n);
                self.history[overlap - n..].copy_from_slice(chunk);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn direct(taps: &[f64], input: &[Complex<f32>]) -> Vec<Complex<f32>> {
        (0..input.len())
            .map(|k| {
                let mut acc = Complex::new(0.0f64, 0.0);
                for (m, &t) in taps.iter().enumerate() {
                    if k >= m {
                        let x = input[k - m];
                        acc += Complex::new(x.re as f64 * t, x.im as f64 * t);
                    }
                }
                Complex::new(acc.re as f32, acc.im as f32)
            })
            .collect()
    }

    fn ramp(n: usize) -> Vec<Complex<f32>> {
        (0..n)
            .map(|i| Complex::new((i as f32 * 0.37).sin(), (i as f32 * 0.11).cos()))
            .collect()
    }

    #[test]
    fn test_matches_direct_convolution() {
        let taps: Vec<f64> = (0..25).map(|i| 1.0 / (1.0 + i as f64)).collect();
        let input = ramp(1000);
        let mut filter = FftFilter::with_taps(&taps, 64);
        let mut out = Vec::new();
        filter.process(&input, &mut out);

        let expected = direct(&taps, &input);
        assert_eq!(out.len(), input.len());
        for (a, b) in out.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-4);
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_block_boundaries_do_not_matter() {
        let taps: Vec<f64> = (0..31).map(|i| ((i as f64) * 0.3).cos() / 31.0).collect();
        let input = ramp(2000);

        let mut whole = FftFilter::with_taps(&taps, 128);
        let mut expected = Vec::new();
        whole.process(&input, &mut expected);

        let mut pieces = FftFilter::with_taps(&taps, 128);
        let mut out = Vec::new();
        let mut offset = 0;
        for size in [1, 7, 30, 97, 98, 5, 400, 1, 1, 1000] {
            let end = (offset + size).min(input.len());
            pieces.process(&input[offset..end], &mut out);
            offset = end;
        }
        pieces.process(&input[offset..], &mut out);

        assert_eq!(out.len(), expected.len());
        for (a, b) in out.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-5);
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-5);
        }
    }
}
