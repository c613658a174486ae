//! Kaiser-window lowpass FIR design.
//!
//! ```text
//!  Lowpass, designed at the INPUT rate
//!  ---------|
//!           \
//!            \
//!             |
//!  ----------------------------------
//!  0        FL FL+tw   fsOut/2   fsIn/2
//! ```
//!
//! The stream is tuned first, then filtered, then decimated, so the filter is
//! a lowpass at the input rate whose transition band has to finish before the
//! output Nyquist edge to keep the decimator from aliasing.

use std::f64::consts::PI;
use std::sync::Arc;

use tracing::{debug, warn};

use super::bessel::{kaiser_beta, kaiser_window};
use crate::error::{Error, Result};

pub const MIN_NUM_TAPS: usize = 25;
pub const MAX_NUM_TAPS: usize = 4 * 1024 * 1024;
pub const MIN_BLOCK_SIZE: usize = 64;
pub const MAX_BLOCK_SIZE: usize = 8 * 1024 * 1024;

/// Requested lowpass characteristics
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    /// Passband edge FL in Hz (half of the filter bandwidth)
    pub half_bandwidth: f64,
    /// Requested transition width in Hz
    pub transition_width: f64,
    /// Passband/stopband error bound, 0 < ripple < 1
    pub ripple: f64,
    pub input_rate: f64,
    pub output_rate: f64,
    /// Caps the tap count at half this size
    pub block_size_hint: usize,
}

/// A designed filter. Never mutated; a new design replaces it wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    taps: Arc<[f64]>,
    block_size: usize,
    transition_width: f64,
    attenuation_db: f64,
    beta: f64,
}

impl FilterState {
    pub fn taps(&self) -> &[f64] {
        &self.taps
    }

    pub fn num_taps(&self) -> usize {
        self.taps.len()
    }

    /// Transform size used for block convolution
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Transition width actually designed for, after the anti-aliasing clamp
    pub fn transition_width(&self) -> f64 {
        self.transition_width
    }

    pub fn attenuation_db(&self) -> f64 {
        self.attenuation_db
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Group delay in input samples
    pub fn group_delay(&self) -> f64 {
        (self.taps.len() as f64 - 1.0) / 2.0
    }
}

/// Smallest power of two greater than or equal to `n` (at least 2)
pub fn pow2ge(n: usize) -> usize {
    n.max(2).next_power_of_two()
}

/// Stopband attenuation in dB for a fractional ripple
pub fn attenuation_db(ripple: f64) -> f64 {
    -20.0 * ripple.log10()
}

/// Kaiser's empirical filter order for a transition width given in radians/sample
pub fn kaiser_order(attenuation_db: f64, transition_rad: f64) -> usize {
    let order = if attenuation_db >= 20.96 {
        (attenuation_db - 7.95) / (2.285 * transition_rad)
    } else {
        5.79 / transition_rad
    };
    // saturating float-to-int cast keeps absurd specs inside usize
    order.ceil() as usize
}

/// Tap count for the given order, clamped to the supported range and to half
/// the block size hint
pub fn tap_count(order: usize, block_size_hint: usize) -> usize {
    let cap = (block_size_hint / 2).min(MAX_NUM_TAPS).max(MIN_NUM_TAPS);
    order.saturating_sub(1).clamp(MIN_NUM_TAPS, cap)
}

/// Transform size for a tap count: power of two, at least 64 and twice the taps
pub fn block_size_for(num_taps: usize) -> usize {
    pow2ge(MIN_BLOCK_SIZE.max(2 * num_taps)).min(MAX_BLOCK_SIZE)
}

/// Ideal lowpass impulse response with cutoff `fc` (cycles/sample), centered
/// on the middle of `len` taps.
pub fn sinc_kernel(len: usize, fc: f64) -> Vec<f64> {
    let mut kernel = vec![0.0; len];
    let center = (len as f64 - 1.0) / 2.0;

    for n in 0..len.div_ceil(2) {
        let m = n as f64 - center;
        let h = if m == 0.0 {
            2.0 * fc
        } else {
            let x = 2.0 * PI * fc * m;
            2.0 * fc * x.sin() / x
        };
        kernel[n] = h;
        kernel[len - 1 - n] = h;
    }
    kernel
}

/// Design the lowpass filter.
pub fn design(spec: &FilterSpec) -> Result<FilterState> {
    if !(spec.input_rate.is_finite() && spec.input_rate > 0.0) {
        return Err(Error::filter_spec(format!(
            "input rate {} must be positive",
            spec.input_rate
        )));
    }
    if !(spec.ripple > 0.0 && spec.ripple < 1.0) {
        return Err(Error::filter_spec(format!(
            "ripple {} must lie in (0, 1)",
            spec.ripple
        )));
    }
    if !spec.half_bandwidth.is_finite() || spec.half_bandwidth < 0.0 {
        return Err(Error::filter_spec(format!(
            "bandwidth {} must be non-negative",
            2.0 * spec.half_bandwidth
        )));
    }

    let mut transition_width = spec.transition_width;
    let max_tw = spec.output_rate / 2.0 - spec.half_bandwidth;
    if max_tw > 0.0 && transition_width > max_tw {
        warn!(
            requested = transition_width,
            replacement = max_tw,
            "transition width too large for output rate, narrowing"
        );
        transition_width = max_tw;
    }
    if !(transition_width.is_finite() && transition_width > 0.0) {
        return Err(Error::filter_spec(format!(
            "transition width {transition_width} must be positive"
        )));
    }

    let atten = attenuation_db(spec.ripple);
    let tw = 2.0 * PI * transition_width / spec.input_rate;
    let order = kaiser_order(atten, tw);
    let num_taps = tap_count(order, spec.block_size_hint);

    let kernel = sinc_kernel(num_taps, spec.half_bandwidth / spec.input_rate);
    let beta = kaiser_beta(atten);
    let window = kaiser_window(num_taps, beta);

    let taps: Arc<[f64]> = kernel
        .iter()
        .zip(window.iter())
        .map(|(k, w)| k * w)
        .collect();
    let block_size = block_size_for(num_taps);

    debug!(
        atten,
        beta,
        order,
        num_taps,
        block_size,
        "designed lowpass filter"
    );

    Ok(FilterState {
        taps,
        block_size,
        transition_width,
        attenuation_db: atten,
        beta,
    })
}
