//! Test helper utilities for generating synthetic sample blocks

#![allow(dead_code)]

use std::f64::consts::TAU;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rustfft::num_complex::Complex;
use tune_filter_decimate::{BlockSink, CollectingSink, Engine, SampleBlock, StreamMetadata};

/// Fixed start time so timestamps are reproducible
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Interleaved I/Q values of a sum of complex tones
///
/// # Arguments
/// * `tones` - (normalized frequency, amplitude) pairs
/// * `num_samples` - Number of complex samples to generate
pub fn complex_tones(tones: &[(f64, f64)], num_samples: usize) -> Vec<f32> {
    let mut buffer = Vec::with_capacity(num_samples * 2);
    for n in 0..num_samples {
        let mut acc = Complex::new(0.0f64, 0.0);
        for &(freq, amp) in tones {
            let (s, c) = (TAU * freq * n as f64).sin_cos();
            acc += Complex::new(c * amp, s * amp);
        }
        buffer.push(acc.re as f32);
        buffer.push(acc.im as f32);
    }
    buffer
}

/// Real cosine at a normalized frequency
pub fn real_tone(freq: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|n| (TAU * freq * n as f64).cos() as f32)
        .collect()
}

/// Cut `values` into blocks of the given sizes (in samples), cycling through
/// `sizes` until the data runs out. Timestamps advance with the data.
pub fn split_blocks(values: &[f32], meta: &StreamMetadata, sizes: &[usize]) -> Vec<SampleBlock> {
    let per_sample = if meta.complex { 2 } else { 1 };
    let mut blocks = Vec::new();
    let mut offset = 0;
    let mut index = 0;
    while offset < values.len() {
        let len = (sizes[index % sizes.len()] * per_sample).min(values.len() - offset);
        let start = offset / per_sample;
        let timestamp = epoch() + Duration::nanoseconds((start as f64 * meta.xdelta * 1e9) as i64);
        blocks.push(SampleBlock::new(
            values[offset..offset + len].to_vec(),
            timestamp,
            meta.clone(),
        ));
        offset += len;
        index += 1;
    }
    blocks
}

/// Run every block through `engine`, returning what the sink saw
pub fn run(engine: &mut Engine, blocks: Vec<SampleBlock>) -> CollectingSink {
    let mut sink = CollectingSink::new();
    run_into(engine, blocks, &mut sink);
    sink
}

pub fn run_into(engine: &mut Engine, blocks: Vec<SampleBlock>, sink: &mut dyn BlockSink) {
    for block in blocks {
        engine.process_block(block, sink);
    }
}

pub fn assert_samples_close(a: &[Complex<f32>], b: &[Complex<f32>], epsilon: f32) {
    assert_eq!(a.len(), b.len(), "sample counts differ");
    for (n, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        assert!(
            (x - y).norm() <= epsilon,
            "sample {n} differs: {x} vs {y}"
        );
    }
}
