//! Tuning-mode algebra.
//!
//! A channel can be addressed three ways that convert into each other given
//! the input sample rate, the RF the input is centered on, and the baseband
//! offset (0 for complex input, `fs/4` for real input):
//!
//! ```text
//! IF   = Norm * InputRate
//! Norm = IF / InputRate
//! RF   = IF + InputRF - offset
//! ```
//!
//! Whichever one the user set last (the tune mode) is authoritative and the
//! other two are recomputed from it.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::input::{KeywordValue, Keywords, CHAN_RF, COL_RF};

/// Which tuning representation is authoritative
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum TuneMode {
    /// Normalized frequency, cycles/sample
    #[default]
    Norm,
    /// Intermediate frequency in Hz, relative to the baseband offset
    If,
    /// Absolute radio frequency in Hz
    Rf,
}

impl std::fmt::Display for TuneMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TuneMode::Norm => write!(f, "NORM"),
            TuneMode::If => write!(f, "IF"),
            TuneMode::Rf => write!(f, "RF"),
        }
    }
}

/// A tuning request tagged with its representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tuning {
    Norm(f64),
    If(f64),
    Rf(f64),
}

impl Tuning {
    pub fn mode(&self) -> TuneMode {
        match self {
            Tuning::Norm(_) => TuneMode::Norm,
            Tuning::If(_) => TuneMode::If,
            Tuning::Rf(_) => TuneMode::Rf,
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            Tuning::Norm(v) | Tuning::If(v) | Tuning::Rf(v) => v,
        }
    }
}

/// Real input is assumed to be centered on a quarter of its sample rate
pub fn baseband_offset(input_rate: f64, complex: bool) -> f64 {
    if complex {
        0.0
    } else {
        input_rate / 4.0
    }
}

/// Fixed quantities the representations are converted with
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TuningFrame {
    pub input_rate: f64,
    /// 0 when unknown
    pub input_rf: f64,
    pub baseband_offset: f64,
}

impl TuningFrame {
    pub fn new(input_rate: f64, input_rf: f64, complex: bool) -> Self {
        Self {
            input_rate,
            input_rf,
            baseband_offset: baseband_offset(input_rate, complex),
        }
    }

    fn rf_from_if(&self, if_hz: f64) -> f64 {
        if self.input_rf != 0.0 {
            if_hz + self.input_rf - self.baseband_offset
        } else {
            0.0
        }
    }

    fn norm_from_if(&self, if_hz: f64) -> f64 {
        if self.input_rate > 0.0 {
            if_hz / self.input_rate
        } else {
            0.0
        }
    }
}

/// The three consistent tuning values
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TuningState {
    pub mode: TuneMode,
    pub norm: f64,
    pub if_hz: f64,
    pub rf_hz: f64,
    pub frame: TuningFrame,
}

impl TuningState {
    /// Recompute all three representations from the authoritative one.
    pub fn resolve(tuning: Tuning, frame: TuningFrame) -> Self {
        let (norm, if_hz, rf_hz) = match tuning {
            Tuning::Norm(requested) => {
                let norm = if requested < -0.5 {
                    warn!(requested, "tuning norm below -0.5, adjusting to minimum");
                    -0.5
                } else if requested > 0.5 {
                    warn!(requested, "tuning norm above 0.5, adjusting to maximum");
                    0.5
                } else {
                    requested
                };
                let if_hz = frame.input_rate * norm;
                (norm, if_hz, frame.rf_from_if(if_hz))
            }
            Tuning::If(if_hz) => (frame.norm_from_if(if_hz), if_hz, frame.rf_from_if(if_hz)),
            Tuning::Rf(rf_hz) => {
                let if_hz = rf_hz - frame.input_rf + frame.baseband_offset;
                let rf_hz = if frame.input_rf != 0.0 { rf_hz } else { 0.0 };
                (frame.norm_from_if(if_hz), if_hz, rf_hz)
            }
        };

        debug!(
            mode = %tuning.mode(),
            input_rate = frame.input_rate,
            input_rf = frame.input_rf,
            norm,
            if_hz,
            rf_hz,
            "tuner settings"
        );

        Self {
            mode: tuning.mode(),
            norm,
            if_hz,
            rf_hz,
            frame,
        }
    }

    /// The current tuning expressed in `mode`
    pub fn in_mode(&self, mode: TuneMode) -> Tuning {
        match mode {
            TuneMode::Norm => Tuning::Norm(self.norm),
            TuneMode::If => Tuning::If(self.if_hz),
            TuneMode::Rf => Tuning::Rf(self.rf_hz),
        }
    }

    /// RF as the integer published in metadata and status
    pub fn rf_hz_rounded(&self) -> i64 {
        self.rf_hz.round() as i64
    }
}

/// Work out the RF the input stream is centered on from its keywords.
///
/// `CHAN_RF` wins over `COL_RF` when both are present. With neither, the
/// input RF is unknown (0), which only matters in RF mode where it is an
/// error.
pub fn resolve_input_rf(keywords: &Keywords, mode: TuneMode) -> Result<f64> {
    let collected = keywords.get_i64(COL_RF);
    let channel = keywords.get_i64(CHAN_RF);

    match (collected, channel) {
        (Some(_), Some(chan)) => {
            warn!("input metadata contains both {COL_RF} and {CHAN_RF}, using {CHAN_RF}");
            Ok(chan as f64)
        }
        (Some(col), None) => Ok(col as f64),
        (None, Some(chan)) => Ok(chan as f64),
        (None, None) if mode == TuneMode::Rf => {
            warn!("input metadata lacks an RF keyword, RF tuning cannot be performed");
            Err(Error::MissingRfKeyword)
        }
        (None, None) => Ok(0.0),
    }
}

/// Record the tuned channel RF in outgoing keywords when it is known.
pub fn annotate(keywords: &mut Keywords, state: &TuningState) {
    if state.frame.input_rf != 0.0 {
        keywords.set(CHAN_RF, KeywordValue::Integer(state.rf_hz_rounded()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_norm_clamped() {
        let frame = TuningFrame::new(1e6, 0.0, true);
        let state = TuningState::resolve(Tuning::Norm(0.7), frame);
        assert_eq!(state.norm, 0.5);
        assert_eq!(state.if_hz, 500_000.0);

        let state = TuningState::resolve(Tuning::Norm(-2.0), frame);
        assert_eq!(state.norm, -0.5);
    }

    #[test]
    fn test_rf_zero_without_input_rf() {
        let frame = TuningFrame::new(1e6, 0.0, true);
        for tuning in [Tuning::Norm(0.1), Tuning::If(1e5), Tuning::Rf(1e9)] {
            assert_eq!(TuningState::resolve(tuning, frame).rf_hz, 0.0);
        }
    }

    #[test]
    fn test_if_mode_with_zero_rate() {
        let frame = TuningFrame::new(0.0, 0.0, true);
        let state = TuningState::resolve(Tuning::If(1000.0), frame);
        assert_eq!(state.norm, 0.0);
    }

    #[test]
    fn test_real_input_rf_mode() {
        // 1 MHz real input collected at 1 GHz, channel at IF fs/8
        let frame = TuningFrame::new(1e6, 1e9, false);
        let rf = 125_000.0 - 250_000.0 + 1e9;
        let state = TuningState::resolve(Tuning::Rf(rf), frame);
        assert_relative_eq!(state.if_hz, 125_000.0);
        assert_relative_eq!(state.norm, 0.125);
        assert_eq!(state.rf_hz, rf);
    }

    #[test]
    fn test_round_trip_between_modes() {
        let frames = [
            TuningFrame::new(1e6, 1e9, true),
            TuningFrame::new(48_000.0, 14_070_000.0, false),
            TuningFrame::new(2.4e6, 97.3e6, true),
        ];
        let modes = [TuneMode::Norm, TuneMode::If, TuneMode::Rf];
        for frame in frames {
            let starts = [
                Tuning::Norm(0.123),
                Tuning::If(-0.2 * frame.input_rate),
                Tuning::Rf(frame.input_rf + 0.05 * frame.input_rate),
            ];
            for start in starts {
                for via in modes {
                    let a = TuningState::resolve(start, frame);
                    let b = TuningState::resolve(a.in_mode(via), frame);
                    let back = b.in_mode(start.mode());
                    assert_relative_eq!(back.value(), start.value(), max_relative = 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_keyword_precedence() {
        let mut kw = Keywords::new();
        assert_eq!(resolve_input_rf(&kw, TuneMode::Norm).unwrap(), 0.0);
        assert!(matches!(
            resolve_input_rf(&kw, TuneMode::Rf),
            Err(Error::MissingRfKeyword)
        ));

        kw.set(COL_RF, KeywordValue::Float(1e9));
        assert_eq!(resolve_input_rf(&kw, TuneMode::Rf).unwrap(), 1e9);

        kw.set(CHAN_RF, KeywordValue::Integer(1_000_200_000));
        assert_eq!(resolve_input_rf(&kw, TuneMode::Rf).unwrap(), 1_000_200_000.0);
    }

    #[test]
    fn test_annotate_only_with_known_rf() {
        let mut kw = Keywords::new();
        let unknown = TuningState::resolve(Tuning::If(1e3), TuningFrame::new(1e5, 0.0, true));
        annotate(&mut kw, &unknown);
        assert!(kw.is_empty());

        let known = TuningState::resolve(Tuning::If(1e3), TuningFrame::new(1e5, 1e8, true));
        annotate(&mut kw, &known);
        assert_eq!(kw.get_i64(CHAN_RF), Some(100_001_000));
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(TuneMode::Norm.to_string(), "NORM");
        assert_eq!(TuneMode::Rf.to_string(), "RF");
    }
}
