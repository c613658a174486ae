//! Integer decimation planning.

use tracing::{debug, warn};

/// Decimation derived from the input rate and the desired output rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResamplePlan {
    pub input_rate: f64,
    pub desired_output_rate: f64,
    /// Keep one sample out of this many, always >= 1
    pub decimation: usize,
    pub output_rate: f64,
}

impl ResamplePlan {
    /// Derive the largest integer decimation that does not drop below the
    /// desired output rate.
    pub fn new(input_rate: f64, desired_output_rate: f64) -> Self {
        let ratio = (input_rate / desired_output_rate).floor();
        let decimation = if ratio.is_finite() && ratio >= 1.0 {
            ratio as usize
        } else {
            warn!(
                input_rate,
                desired_output_rate, "decimation less than 1, setting to minimum"
            );
            1
        };
        let output_rate = input_rate / decimation as f64;
        debug!(decimation, output_rate, "resample plan");

        Self {
            input_rate,
            desired_output_rate,
            decimation,
            output_rate,
        }
    }

    /// Sample interval of the decimated stream
    pub fn output_xdelta(&self) -> f64 {
        1.0 / self.output_rate
    }

    /// Warn when the output band is narrower than the requested passband.
    /// Returns false in that case; processing continues either way.
    pub fn check_bandwidth(&self, filter_bandwidth: f64) -> bool {
        if self.output_rate < filter_bandwidth {
            warn!(
                output_rate = self.output_rate,
                filter_bandwidth, "output sample rate is less than the filter bandwidth"
            );
            return false;
        }
        true
    }
}
