//! Signal processing building blocks of the stage.
//!
//! ```text
//! samples -> Nco (tune) -> FftFilter (lowpass) -> Decimator -> output
//! ```
//!
//! - [`bessel`]: modified Bessel I0 and Kaiser window weights
//! - [`design`]: Kaiser-window lowpass FIR designer
//! - [`resample`]: integer decimation planning
//! - [`nco`]: phase-continuous down-converting mixer
//! - [`fft_filter`]: overlap-save block FIR filter
//! - [`decimate`]: keep-one-in-N with persistent phase
//!
//! Every block keeps its own state and is not thread-safe; the engine owns
//! one instance of each on the worker thread.

pub mod bessel;
pub mod decimate;
pub mod design;
pub mod fft_filter;
pub mod nco;
pub mod resample;

pub use decimate::Decimator;
pub use design::{design, FilterSpec, FilterState};
pub use fft_filter::FftFilter;
pub use nco::Nco;
pub use resample::ResamplePlan;
