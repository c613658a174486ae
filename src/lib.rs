//! Streaming tune, lowpass-filter and decimate stage.
//!
//! A single active stream of complex or real samples is shifted by a
//! numerically controlled oscillator, filtered with a Kaiser-window FIR
//! applied by FFT overlap-save, and decimated by an integer factor. Tuning
//! can be given as a normalized frequency, an IF or an absolute RF; the
//! filter and decimation follow the input rate and the requested output rate
//! and are rebuilt whenever either changes.
//!
//! ```no_run
//! use chrono::Utc;
//! use tune_filter_decimate::{CollectingSink, ConfigHandle, Engine, SampleBlock, StreamMetadata};
//!
//! let config = ConfigHandle::default();
//! config.set_tuning_norm(0.1);
//! let mut engine = Engine::new(config);
//! let mut sink = CollectingSink::new();
//!
//! let meta = StreamMetadata::new("capture", 100_000.0, true);
//! engine.process_block(SampleBlock::new(vec![0.0; 8192], Utc::now(), meta), &mut sink);
//! ```

pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod host;
pub mod input;
pub mod logging;
pub mod output;
pub mod stage;
pub mod tuning;

pub use config::{ConfigHandle, Properties, Status};
pub use engine::{BlockOutcome, DropReason, Engine, EngineSnapshot, EngineState, EngineStats};
pub use error::{Error, Result};
pub use host::{BlockSink, BlockSource, ChannelSink, ChannelSource, CollectingSink, OutputBlock, SinkEvent};
pub use input::{KeywordValue, Keywords, SampleBlock, StreamMetadata, CHAN_RF, COL_RF};
pub use stage::Stage;
pub use tuning::{TuneMode, Tuning, TuningState};
