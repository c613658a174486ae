//! The streaming engine: one active stream, tuned, filtered and decimated
//! block by block.
//!
//! Every call to [`Engine::process_block`] runs to completion on the worker
//! thread. The control path never touches the engine; it only updates the
//! [`ConfigHandle`], whose dirty flags the engine takes at the top of each
//! block.
//!
//! ```text
//! block ─► identity ─► data loss ─► reconfigure? ─► mix ─► filter ─► decimate ─► sink
//!                                   tuning → plan → design
//! ```

use chrono::Duration;
use rustfft::num_complex::Complex;
use tracing::{debug, info, trace, warn};

use crate::config::{ConfigHandle, Status};
use crate::dsp::{design, Decimator, FftFilter, FilterSpec, FilterState, Nco, ResamplePlan};
use crate::error::{Error, Result};
use crate::host::{BlockSink, OutputBlock};
use crate::input::{SampleBlock, StreamMetadata};
use crate::tuning::{self, TuningFrame, TuningState};

/// Coarse engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No stream adopted yet, or the last one ended
    Unconfigured,
    Active,
}

/// Why a block produced no output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Belongs to a stream other than the active one
    ForeignStream,
    /// Reconfiguration for this block could not complete
    ReconfigureFailed,
    /// The stage has never been configured successfully
    Unconfigured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Number of output samples pushed
    Processed(usize),
    Dropped(DropReason),
}

/// Counters kept over the lifetime of the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub blocks_processed: u64,
    pub blocks_dropped: u64,
    pub reconfigurations: u64,
    pub filter_rebuilds: u64,
    pub discontinuities: u64,
    pub samples_in: u64,
    pub samples_out: u64,
}

/// Everything that carries over between blocks, for comparison in tests and
/// diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub active_stream: Option<String>,
    pub input_metadata: Option<StreamMetadata>,
    pub output_metadata: Option<StreamMetadata>,
    pub tuning: TuningState,
    pub plan: Option<ResamplePlan>,
    pub taps: Option<Vec<f64>>,
    pub nco_phase: Option<f64>,
    pub nco_frequency: Option<f64>,
    pub decimator_next_keep: Option<usize>,
    pub filter_history: Option<Vec<Complex<f32>>>,
    pub filter_dirty: bool,
    pub tuning_dirty: bool,
    pub stats: EngineStats,
}

/// Mixer, filter and decimator, replaced as a unit on every filter rebuild
struct Chain {
    nco: Nco,
    filter: FftFilter,
    decimator: Decimator,
}

impl Chain {
    fn new(filter: &FilterState, decimation: usize, norm: f64) -> Self {
        Self {
            nco: Nco::new(norm),
            filter: FftFilter::new(filter),
            decimator: Decimator::new(decimation),
        }
    }
}

pub struct Engine {
    config: ConfigHandle,
    active_stream: Option<String>,
    /// Input metadata the current configuration was derived from
    input_metadata: Option<StreamMetadata>,
    /// Metadata last published downstream for the active stream
    output_metadata: Option<StreamMetadata>,
    tuning: TuningState,
    plan: Option<ResamplePlan>,
    filter: Option<FilterState>,
    chain: Option<Chain>,
    filter_dirty: bool,
    tuning_dirty: bool,
    stats: EngineStats,
    mixed: Vec<Complex<f32>>,
    filtered: Vec<Complex<f32>>,
}

impl Engine {
    pub fn new(config: ConfigHandle) -> Self {
        Self {
            config,
            active_stream: None,
            input_metadata: None,
            output_metadata: None,
            tuning: TuningState::default(),
            plan: None,
            filter: None,
            chain: None,
            filter_dirty: false,
            tuning_dirty: false,
            stats: EngineStats::default(),
            mixed: Vec::new(),
            filtered: Vec::new(),
        }
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        match self.active_stream {
            Some(_) => EngineState::Active,
            None => EngineState::Unconfigured,
        }
    }

    pub fn active_stream(&self) -> Option<&str> {
        self.active_stream.as_deref()
    }

    pub fn tuning(&self) -> &TuningState {
        &self.tuning
    }

    pub fn plan(&self) -> Option<&ResamplePlan> {
        self.plan.as_ref()
    }

    pub fn filter(&self) -> Option<&FilterState> {
        self.filter.as_ref()
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            active_stream: self.active_stream.clone(),
            input_metadata: self.input_metadata.clone(),
            output_metadata: self.output_metadata.clone(),
            tuning: self.tuning,
            plan: self.plan,
            taps: self.filter.as_ref().map(|f| f.taps().to_vec()),
            nco_phase: self.chain.as_ref().map(|c| c.nco.phase()),
            nco_frequency: self.chain.as_ref().map(|c| c.nco.frequency()),
            decimator_next_keep: self.chain.as_ref().map(|c| c.decimator.next_keep()),
            filter_history: self.chain.as_ref().map(|c| c.filter.history().to_vec()),
            filter_dirty: self.filter_dirty,
            tuning_dirty: self.tuning_dirty,
            stats: self.stats,
        }
    }

    /// Configure from metadata of a stream that is already open before the
    /// first block arrives. Failure is logged; the first block retries.
    pub fn prime(&mut self, metadata: &StreamMetadata) {
        self.take_config_dirty();
        match self.reconfigure(metadata) {
            Ok(_) => info!(stream = %metadata.stream_id, "configured from active stream"),
            Err(err) => warn!(stream = %metadata.stream_id, %err, "initial configuration failed"),
        }
    }

    /// Run one block through the stage.
    pub fn process_block(&mut self, block: SampleBlock, sink: &mut dyn BlockSink) -> BlockOutcome {
        match &self.active_stream {
            None => {
                debug!(stream = %block.stream_id(), "adopting stream");
                self.active_stream = Some(block.stream_id().to_string());
            }
            Some(active) if active != block.stream_id() => {
                trace!(
                    active = %active,
                    received = %block.stream_id(),
                    "dropping block from a stream other than the active one"
                );
                return BlockOutcome::Dropped(DropReason::ForeignStream);
            }
            Some(_) => {}
        }

        if block.queue_flushed {
            warn!(stream = %block.stream_id(), "input queue flushed, data has been lost");
            self.filter_dirty = true;
            self.stats.discontinuities += 1;
        }

        self.take_config_dirty();
        let metadata_changed =
            block.metadata_changed || self.input_metadata.as_ref() != Some(&block.metadata);
        if metadata_changed
            || self.filter_dirty
            || self.tuning_dirty
            || self.output_metadata.is_none()
        {
            match self.reconfigure(&block.metadata) {
                Ok(out) => {
                    sink.publish_metadata(&out);
                    self.output_metadata = Some(out);
                }
                Err(err) => {
                    warn!(stream = %block.stream_id(), %err, "reconfiguration failed, dropping block");
                    return self.drop_block(&block, DropReason::ReconfigureFailed, sink);
                }
            }
        }

        let (Some(chain), Some(plan), Some(filter)) =
            (self.chain.as_mut(), self.plan.as_ref(), self.filter.as_ref())
        else {
            trace!("no filter configured, dropping block");
            return self.drop_block(&block, DropReason::Unconfigured, sink);
        };

        to_complex(&block.data, block.metadata.complex, &mut self.mixed);
        let first_keep = chain.decimator.next_keep();

        chain.nco.mix(&mut self.mixed);
        self.filtered.clear();
        chain.filter.process(&self.mixed, &mut self.filtered);
        let mut samples = Vec::with_capacity(self.filtered.len() / plan.decimation + 1);
        chain.decimator.process(&self.filtered, &mut samples);

        let offset = (first_keep as f64 - filter.group_delay()) / plan.input_rate;
        let timestamp = block.timestamp + Duration::nanoseconds((offset * 1e9).round() as i64);

        self.stats.blocks_processed += 1;
        self.stats.samples_in += self.mixed.len() as u64;
        self.stats.samples_out += samples.len() as u64;
        let produced = samples.len();
        trace!(input = self.mixed.len(), output = produced, "block processed");

        if produced > 0 || block.eos {
            sink.push_block(OutputBlock {
                stream_id: block.stream_id().to_string(),
                samples,
                timestamp,
                eos: block.eos,
            });
        }
        if block.eos {
            self.end_stream(block.stream_id());
        }
        BlockOutcome::Processed(produced)
    }

    fn take_config_dirty(&mut self) {
        let dirty = self.config.take_dirty();
        self.filter_dirty |= dirty.filter;
        self.tuning_dirty |= dirty.tuning;
    }

    fn drop_block(
        &mut self,
        block: &SampleBlock,
        reason: DropReason,
        sink: &mut dyn BlockSink,
    ) -> BlockOutcome {
        self.stats.blocks_dropped += 1;
        if block.eos {
            if self.output_metadata.is_some() {
                sink.push_block(OutputBlock {
                    stream_id: block.stream_id().to_string(),
                    samples: Vec::new(),
                    timestamp: block.timestamp,
                    eos: true,
                });
            }
            self.end_stream(block.stream_id());
        }
        BlockOutcome::Dropped(reason)
    }

    fn end_stream(&mut self, stream: &str) {
        debug!(stream, "end of stream");
        self.active_stream = None;
        self.output_metadata = None;
        self.input_metadata = None;
        self.filter_dirty = true;
        self.tuning_dirty = true;
    }

    /// Tuning, resample plan and filter design for `metadata`, committed only
    /// when all three succeed. Returns the outgoing metadata.
    fn reconfigure(&mut self, metadata: &StreamMetadata) -> Result<StreamMetadata> {
        let snapshot = self.config.snapshot();
        let props = &snapshot.properties;

        if !(metadata.xdelta.is_finite() && metadata.xdelta > 0.0) {
            return Err(Error::InvalidSampleInterval(metadata.xdelta));
        }
        let input_rate = metadata.sample_rate();

        let input_rf = tuning::resolve_input_rf(&metadata.keywords, props.tune_mode)?;
        let frame = TuningFrame::new(input_rate, input_rf, metadata.complex);
        let tuning = TuningState::resolve(props.tuning(), frame);

        let plan = ResamplePlan::new(input_rate, props.desired_output_rate);
        plan.check_bandwidth(props.filter_bandwidth);

        let remake = self.filter_dirty
            || self.chain.is_none()
            || self
                .plan
                .map_or(true, |p| p.input_rate != plan.input_rate || p.decimation != plan.decimation);
        let filter = if remake {
            Some(design(&FilterSpec {
                half_bandwidth: props.filter_bandwidth / 2.0,
                transition_width: props.filter_transition_width,
                ripple: props.filter_ripple,
                input_rate,
                output_rate: plan.output_rate,
                block_size_hint: props.filter_block_size_hint,
            })?)
        } else {
            None
        };

        if let Some(previous) = &self.input_metadata {
            if previous.complex != metadata.complex {
                info!(complex = metadata.complex, "input mode changed");
            }
        }

        if let Some(filter) = filter {
            self.chain = Some(Chain::new(&filter, plan.decimation, tuning.norm));
            debug!(
                taps = filter.num_taps(),
                block_size = filter.block_size(),
                decimation = plan.decimation,
                "filter rebuilt"
            );
            self.filter = Some(filter);
            self.stats.filter_rebuilds += 1;
        } else if let Some(chain) = self.chain.as_mut() {
            if chain.nco.frequency() != tuning.norm {
                debug!(norm = tuning.norm, "retuning mixer");
            }
            chain.nco.retune(tuning.norm);
        }

        self.tuning = tuning;
        self.plan = Some(plan);
        self.input_metadata = Some(metadata.clone());
        self.filter_dirty = false;
        self.tuning_dirty = false;
        self.stats.reconfigurations += 1;
        self.config.record_tuning(snapshot.version, &tuning);
        self.publish_status();

        let mut out = metadata.clone();
        out.complex = true;
        out.xdelta = plan.output_xdelta();
        tuning::annotate(&mut out.keywords, &tuning);
        Ok(out)
    }

    fn publish_status(&self) {
        let (Some(plan), Some(filter)) = (self.plan.as_ref(), self.filter.as_ref()) else {
            return;
        };
        self.config.publish_status(Status {
            input_rate: plan.input_rate,
            input_rf: self.tuning.frame.input_rf,
            decimation_factor: plan.decimation,
            actual_output_rate: plan.output_rate,
            tune_mode: self.tuning.mode,
            tuning_norm: self.tuning.norm,
            tuning_if: self.tuning.if_hz,
            tuning_rf: self.tuning.rf_hz_rounded(),
            block_size: filter.block_size(),
            transition_width: filter.transition_width(),
            taps: filter.taps().to_vec(),
        });
    }
}

/// Widen the raw block into complex samples. Interleaved pairs pass through;
/// real samples get a zero imaginary part.
fn to_complex(data: &[f32], complex: bool, out: &mut Vec<Complex<f32>>) {
    out.clear();
    if complex {
        if data.len() % 2 != 0 {
            warn!(len = data.len(), "odd number of values in complex block, dropping the last one");
        }
        out.extend(data.chunks_exact(2).map(|p| Complex::new(p[0], p[1])));
    } else {
        out.extend(data.iter().map(|&x| Complex::new(x, 0.0)));
    }
}
