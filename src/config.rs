//! User-facing properties and the handle the control path shares with the
//! worker.
//!
//! The control path replaces whole [`Snapshot`]s behind a lock and raises a
//! dirty flag for the part of the pipeline the change affects. The worker
//! picks up the flags at the start of the next block and reads the newest
//! snapshot while reconfiguring, so a block is always processed with one
//! consistent set of properties.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::tuning::{TuneMode, Tuning, TuningState};

/// Configurable properties of the stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Properties {
    pub tune_mode: TuneMode,
    pub tuning_norm: f64,
    #[serde(rename = "tuningIF")]
    pub tuning_if: f64,
    #[serde(rename = "tuningRF")]
    pub tuning_rf: i64,
    /// Full passband width in Hz
    pub filter_bandwidth: f64,
    pub desired_output_rate: f64,
    pub filter_transition_width: f64,
    pub filter_ripple: f64,
    pub filter_block_size_hint: usize,
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            tune_mode: TuneMode::Norm,
            tuning_norm: 0.0,
            tuning_if: 0.0,
            tuning_rf: 0,
            filter_bandwidth: 8000.0,
            desired_output_rate: 10_000.0,
            filter_transition_width: 800.0,
            filter_ripple: 0.01,
            filter_block_size_hint: 128,
        }
    }
}

impl Properties {
    /// Load from a JSON file; missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// The authoritative tuning value for the current mode
    pub fn tuning(&self) -> Tuning {
        match self.tune_mode {
            TuneMode::Norm => Tuning::Norm(self.tuning_norm),
            TuneMode::If => Tuning::If(self.tuning_if),
            TuneMode::Rf => Tuning::Rf(self.tuning_rf as f64),
        }
    }

    fn tuning_differs(&self, other: &Properties) -> bool {
        self.tune_mode != other.tune_mode
            || self.tuning_norm != other.tuning_norm
            || self.tuning_if != other.tuning_if
            || self.tuning_rf != other.tuning_rf
    }

    fn filter_differs(&self, other: &Properties) -> bool {
        self.filter_bandwidth != other.filter_bandwidth
            || self.desired_output_rate != other.desired_output_rate
            || self.filter_transition_width != other.filter_transition_width
            || self.filter_ripple != other.filter_ripple
            || self.filter_block_size_hint != other.filter_block_size_hint
    }
}

/// A versioned copy of the properties
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub version: u64,
    pub properties: Properties,
}

/// Dirty flags taken by the worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dirty {
    pub tuning: bool,
    pub filter: bool,
}

/// Values derived by the last successful reconfiguration
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub input_rate: f64,
    #[serde(rename = "inputRF")]
    pub input_rf: f64,
    pub decimation_factor: usize,
    pub actual_output_rate: f64,
    pub tune_mode: TuneMode,
    pub tuning_norm: f64,
    #[serde(rename = "tuningIF")]
    pub tuning_if: f64,
    #[serde(rename = "tuningRF")]
    pub tuning_rf: i64,
    pub block_size: usize,
    pub transition_width: f64,
    pub taps: Vec<f64>,
}

struct Shared {
    current: RwLock<Arc<Snapshot>>,
    status: RwLock<Arc<Status>>,
    tuning_dirty: AtomicBool,
    filter_dirty: AtomicBool,
}

/// Cloneable handle to the stage properties
#[derive(Clone)]
pub struct ConfigHandle {
    shared: Arc<Shared>,
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(Properties::default())
    }
}

impl std::fmt::Debug for ConfigHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigHandle")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl ConfigHandle {
    pub fn new(properties: Properties) -> Self {
        Self {
            shared: Arc::new(Shared {
                current: RwLock::new(Arc::new(Snapshot {
                    version: 0,
                    properties,
                })),
                status: RwLock::new(Arc::new(Status::default())),
                tuning_dirty: AtomicBool::new(false),
                filter_dirty: AtomicBool::new(false),
            }),
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.shared
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn properties(&self) -> Properties {
        self.snapshot().properties.clone()
    }

    /// Apply `change` to a copy of the properties and publish it as a new
    /// version. Nothing is published when the change is a no-op.
    pub fn update(&self, change: impl FnOnce(&mut Properties)) {
        let mut current = self
            .shared
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut properties = current.properties.clone();
        change(&mut properties);
        if properties == current.properties {
            return;
        }

        let tuning = properties.tuning_differs(&current.properties);
        let filter = properties.filter_differs(&current.properties);
        let version = current.version + 1;
        *current = Arc::new(Snapshot {
            version,
            properties,
        });
        drop(current);

        if tuning {
            self.shared.tuning_dirty.store(true, Ordering::Release);
        }
        if filter {
            self.shared.filter_dirty.store(true, Ordering::Release);
        }
        debug!(version, tuning, filter, "properties updated");
    }

    pub fn replace(&self, properties: Properties) {
        self.update(|p| *p = properties);
    }

    pub fn set_tune_mode(&self, mode: TuneMode) {
        self.update(|p| p.tune_mode = mode);
    }

    pub fn set_tuning_norm(&self, norm: f64) {
        self.update(|p| p.tuning_norm = norm);
    }

    pub fn set_tuning_if(&self, if_hz: f64) {
        self.update(|p| p.tuning_if = if_hz);
    }

    pub fn set_tuning_rf(&self, rf_hz: i64) {
        self.update(|p| p.tuning_rf = rf_hz);
    }

    pub fn set_filter_bandwidth(&self, bandwidth: f64) {
        self.update(|p| p.filter_bandwidth = bandwidth);
    }

    pub fn set_desired_output_rate(&self, rate: f64) {
        self.update(|p| p.desired_output_rate = rate);
    }

    pub fn set_filter_transition_width(&self, width: f64) {
        self.update(|p| p.filter_transition_width = width);
    }

    pub fn set_filter_ripple(&self, ripple: f64) {
        self.update(|p| p.filter_ripple = ripple);
    }

    pub fn set_filter_block_size_hint(&self, hint: usize) {
        self.update(|p| p.filter_block_size_hint = hint);
    }

    /// Store the tuning the worker resolved from properties `version`, so
    /// that Norm, IF and RF read back consistently and a later bare mode
    /// change starts from the channel in use. Raises no dirty flag. Returns
    /// false without storing anything if the properties changed since
    /// `version`; that change is already pending as a dirty flag.
    pub(crate) fn record_tuning(&self, version: u64, tuning: &TuningState) -> bool {
        let mut current = self
            .shared
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if current.version != version {
            return false;
        }

        let mut properties = current.properties.clone();
        properties.tuning_norm = tuning.norm;
        properties.tuning_if = tuning.if_hz;
        properties.tuning_rf = tuning.rf_hz_rounded();
        if properties != current.properties {
            *current = Arc::new(Snapshot {
                version: version + 1,
                properties,
            });
            debug!(version = version + 1, "resolved tuning recorded");
        }
        true
    }

    /// Take and clear the pending dirty flags.
    pub fn take_dirty(&self) -> Dirty {
        Dirty {
            tuning: self.shared.tuning_dirty.swap(false, Ordering::AcqRel),
            filter: self.shared.filter_dirty.swap(false, Ordering::AcqRel),
        }
    }

    pub fn status(&self) -> Arc<Status> {
        self.shared
            .status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn publish_status(&self, status: Status) {
        *self
            .shared
            .status
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = Properties::default();
        assert_eq!(p.tune_mode, TuneMode::Norm);
        assert_eq!(p.filter_bandwidth, 8000.0);
        assert_eq!(p.desired_output_rate, 10_000.0);
        assert_eq!(p.filter_transition_width, 800.0);
        assert_eq!(p.filter_ripple, 0.01);
        assert_eq!(p.filter_block_size_hint, 128);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let p: Properties =
            serde_json::from_str(r#"{"tuneMode": "RF", "tuningRF": 100200000}"#).unwrap();
        assert_eq!(p.tune_mode, TuneMode::Rf);
        assert_eq!(p.tuning_rf, 100_200_000);
        assert_eq!(p.filter_bandwidth, 8000.0);
        assert_eq!(p.tuning(), Tuning::Rf(100_200_000.0));
    }

    #[test]
    fn test_dirty_flags_follow_changed_fields() {
        let handle = ConfigHandle::default();
        assert_eq!(handle.take_dirty(), Dirty::default());

        handle.set_tuning_if(1000.0);
        assert_eq!(
            handle.take_dirty(),
            Dirty {
                tuning: true,
                filter: false
            }
        );
        assert_eq!(handle.take_dirty(), Dirty::default());

        handle.set_filter_ripple(0.001);
        handle.set_desired_output_rate(20_000.0);
        assert_eq!(
            handle.take_dirty(),
            Dirty {
                tuning: false,
                filter: true
            }
        );
    }

    #[test]
    fn test_noop_update_keeps_version() {
        let handle = ConfigHandle::default();
        handle.set_filter_bandwidth(8000.0);
        assert_eq!(handle.snapshot().version, 0);
        assert_eq!(handle.take_dirty(), Dirty::default());

        handle.set_filter_bandwidth(4000.0);
        assert_eq!(handle.snapshot().version, 1);
    }

    #[test]
    fn test_clones_share_state() {
        let handle = ConfigHandle::default();
        let other = handle.clone();
        other.set_tune_mode(TuneMode::If);
        assert_eq!(handle.properties().tune_mode, TuneMode::If);
        assert!(handle.take_dirty().tuning);
        assert!(!other.take_dirty().tuning);
    }

    #[test]
    fn test_record_tuning_raises_no_flags() {
        use crate::tuning::TuningFrame;

        let handle = ConfigHandle::new(Properties {
            tuning_norm: 0.9,
            ..Properties::default()
        });
        let frame = TuningFrame::new(100_000.0, 1e9, true);
        let resolved = TuningState::resolve(handle.properties().tuning(), frame);

        assert!(handle.record_tuning(0, &resolved));
        let p = handle.properties();
        assert_eq!(p.tuning_norm, 0.5);
        assert_eq!(p.tuning_if, 50_000.0);
        assert_eq!(p.tuning_rf, 1_000_050_000);
        assert_eq!(handle.snapshot().version, 1);
        assert_eq!(handle.take_dirty(), Dirty::default());

        // recording the same values again publishes nothing new
        assert!(handle.record_tuning(1, &resolved));
        assert_eq!(handle.snapshot().version, 1);
    }

    #[test]
    fn test_record_tuning_skips_stale_version() {
        use crate::tuning::TuningFrame;

        let handle = ConfigHandle::default();
        let frame = TuningFrame::new(100_000.0, 0.0, true);
        let resolved = TuningState::resolve(Tuning::Norm(0.1), frame);

        handle.set_tuning_if(2000.0);
        assert!(!handle.record_tuning(0, &resolved));
        assert_eq!(handle.properties().tuning_if, 2000.0);
        assert_eq!(handle.properties().tuning_norm, 0.0);
        assert!(handle.take_dirty().tuning);
    }

    #[test]
    fn test_status_serializes() {
        let handle = ConfigHandle::default();
        handle.publish_status(Status {
            decimation_factor: 4,
            taps: vec![0.25; 3],
            ..Status::default()
        });
        let json = serde_json::to_value(&*handle.status()).unwrap();
        assert_eq!(json["decimationFactor"], 4);
        assert_eq!(json["taps"].as_array().unwrap().len(), 3);
        assert_eq!(json["tuneMode"], "NORM");
    }
}
