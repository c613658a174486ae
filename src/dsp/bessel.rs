//! Zeroth-order modified Bessel function and Kaiser window weights.

/// Maximum number of series terms summed by [`bessel_i0`]
const I0_MAX_TERMS: usize = 24;
/// Relative contribution below which the series is considered converged
const I0_TOLERANCE: f64 = 1e-7;

/// Modified Bessel function of the first kind, order 0.
///
/// Evaluated from its power series `sum ((x/2)^k / k!)^2`, truncated after
/// 24 terms or as soon as a term adds less than `1e-7` of the running sum.
/// That is plenty for the Kaiser beta values produced by the filter designer.
pub fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut term = 1.0;
    let mut sum = 1.0;

    for k in 1..=I0_MAX_TERMS {
        term *= half / k as f64;
        let contribution = term * term;
        sum += contribution;
        if contribution < I0_TOLERANCE * sum {
            break;
        }
    }
    sum
}

/// Kaiser window beta for a stopband attenuation given in dB.
pub fn kaiser_beta(attenuation_db: f64) -> f64 {
    if attenuation_db > 50.0 {
        0.1102 * (attenuation_db - 8.7)
    } else if attenuation_db >= 20.96 {
        let a = attenuation_db - 20.96;
        0.58417 * a.powf(0.4) + 0.07886 * a
    } else {
        0.0
    }
}

/// Kaiser window of `len` points.
///
/// Only the first half is evaluated, the second half is its mirror image, so
/// the result is exactly symmetric.
pub fn kaiser_window(len: usize, beta: f64) -> Vec<f64> {
    match len {
        0 => return Vec::new(),
        1 => return vec![1.0],
        _ => {}
    }

    let mut window = vec![0.0; len];
    let denom = bessel_i0(beta);
    let span = (len - 1) as f64;

    for i in 0..len.div_ceil(2) {
        let x = 2.0 * i as f64 / span - 1.0;
        // 1 - x^2 can dip just below zero at the edges; sqrt would give NaN
        let arg = (1.0 - x * x).max(0.0).sqrt();
        let w = bessel_i0(beta * arg) / denom;
        window[i] = w;
        window[len - 1 - i] = w;
    }
    window
}
