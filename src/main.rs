use chrono::{Local, Utc};
use clap::Parser;
use crossbeam::channel::{Receiver, Sender};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use tune_filter_decimate::input::{self, RawStreamReader, StreamFormat};
use tune_filter_decimate::logging::{self, LogFormat};
use tune_filter_decimate::output;
use tune_filter_decimate::{
    ChannelSink, ChannelSource, ConfigHandle, KeywordValue, Properties, SampleBlock, SinkEvent,
    Stage, StreamMetadata, TuneMode, COL_RF,
};

/// Tune, lowpass filter and decimate IQ recordings or live streams
#[derive(Parser, Debug)]
#[command(name = "tfd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Input WAV file (stereo = I/Q, mono = real)
    #[arg(value_name = "INPUT")]
    input_file: Option<PathBuf>,

    /// Read a raw sample stream from a TCP server instead of a file
    #[arg(short, long, value_name = "HOST:PORT")]
    stream: Option<String>,

    /// Output directory for the decimated recording
    #[arg(short, long, default_value = "./output")]
    output_dir: PathBuf,

    /// JSON file with stage properties; flags below override it
    #[arg(short, long, value_name = "FILE")]
    properties: Option<PathBuf>,

    /// Which tuning value is authoritative
    #[arg(long, value_enum)]
    tune_mode: Option<TuneMode>,

    /// Normalized tuning frequency, cycles/sample in [-0.5, 0.5]
    #[arg(long, allow_hyphen_values = true)]
    tuning_norm: Option<f64>,

    /// Tuning IF in Hz
    #[arg(long, allow_hyphen_values = true)]
    tuning_if: Option<f64>,

    /// Tuning RF in Hz
    #[arg(long)]
    tuning_rf: Option<i64>,

    /// Full passband width in Hz
    #[arg(short, long)]
    bandwidth: Option<f64>,

    /// Desired output sample rate in Hz
    #[arg(short = 'r', long)]
    output_rate: Option<f64>,

    /// Filter transition width in Hz
    #[arg(long)]
    transition_width: Option<f64>,

    /// Filter ripple, fraction in (0, 1)
    #[arg(long)]
    ripple: Option<f64>,

    /// Upper bound on the FFT block size
    #[arg(long)]
    block_size_hint: Option<usize>,

    /// RF the input was collected at, in Hz (adds a COL_RF keyword)
    #[arg(long)]
    col_rf: Option<i64>,

    /// Input sample rate for stream mode (Hz)
    #[arg(long, default_value = "48000")]
    rate: u32,

    /// Stream sample format
    #[arg(long, value_enum, default_value_t = StreamFormat::Float32)]
    format: StreamFormat,

    /// Stream carries real samples rather than interleaved I/Q
    #[arg(long)]
    real: bool,

    /// Input sample frames per block handed to the stage
    #[arg(long, default_value = "8192")]
    block_len: usize,

    /// Output float32 WAV (for inspectrum) instead of int16 (for URH)
    #[arg(long)]
    float32: bool,

    /// Print the derived stage status as JSON when done
    #[arg(long)]
    status: bool,

    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Args {
    fn build_properties(&self) -> tune_filter_decimate::Result<Properties> {
        let mut props = match &self.properties {
            Some(path) => Properties::from_json_file(path)?,
            None => Properties::default(),
        };
        if let Some(mode) = self.tune_mode {
            props.tune_mode = mode;
        }
        if let Some(norm) = self.tuning_norm {
            props.tuning_norm = norm;
        }
        if let Some(if_hz) = self.tuning_if {
            props.tuning_if = if_hz;
        }
        if let Some(rf_hz) = self.tuning_rf {
            props.tuning_rf = rf_hz;
        }
        if let Some(bw) = self.bandwidth {
            props.filter_bandwidth = bw;
        }
        if let Some(rate) = self.output_rate {
            props.desired_output_rate = rate;
        }
        if let Some(tw) = self.transition_width {
            props.filter_transition_width = tw;
        }
        if let Some(ripple) = self.ripple {
            props.filter_ripple = ripple;
        }
        if let Some(hint) = self.block_size_hint {
            props.filter_block_size_hint = hint;
        }
        Ok(props)
    }

    fn metadata(&self, stream_id: &str, sample_rate: f64, complex: bool) -> StreamMetadata {
        let meta = StreamMetadata::new(stream_id, sample_rate, complex);
        match self.col_rf {
            Some(rf) => meta.with_keyword(COL_RF, KeywordValue::Integer(rf)),
            None => meta,
        }
    }
}

/// Everything the stage produced for the stream
#[derive(Default)]
struct Collected {
    metadata: Option<StreamMetadata>,
    samples: Vec<rustfft::num_complex::Complex<f32>>,
}

fn collect_output(events: Receiver<SinkEvent>) -> Collected {
    let mut collected = Collected::default();
    for event in events.iter() {
        match event {
            SinkEvent::Metadata(meta) => collected.metadata = Some(meta),
            SinkEvent::Block(block) => collected.samples.extend_from_slice(&block.samples),
        }
    }
    collected
}

/// Hand the recording to the stage in `block_len` frames, flagging the last
/// block as end of stream.
fn feed_values(
    tx: &Sender<SampleBlock>,
    values: &[f32],
    meta: &StreamMetadata,
    block_len: usize,
) -> tune_filter_decimate::Result<()> {
    let per_frame = if meta.complex { 2 } else { 1 };
    let start = Utc::now();
    let chunks: Vec<&[f32]> = values.chunks(block_len * per_frame).collect();
    let last = chunks.len().saturating_sub(1);

    if chunks.is_empty() {
        let mut block = SampleBlock::new(Vec::new(), start, meta.clone());
        block.eos = true;
        return send(tx, block);
    }
    for (n, chunk) in chunks.into_iter().enumerate() {
        let offset = (n * block_len) as f64 * meta.xdelta;
        let timestamp = start + chrono::Duration::nanoseconds((offset * 1e9) as i64);
        let mut block = SampleBlock::new(chunk.to_vec(), timestamp, meta.clone());
        block.eos = n == last;
        send(tx, block)?;
    }
    Ok(())
}

fn feed_stream<R: std::io::Read>(
    tx: &Sender<SampleBlock>,
    reader: &mut RawStreamReader<R>,
    meta: &StreamMetadata,
    block_len: usize,
) -> tune_filter_decimate::Result<()> {
    let per_frame = if meta.complex { 2 } else { 1 };
    let mut pending: Option<SampleBlock> = None;
    let mut frames = 0usize;
    let start = Utc::now();

    while let Some(values) = reader.read_chunk(block_len * per_frame)? {
        if let Some(block) = pending.take() {
            send(tx, block)?;
        }
        let offset = frames as f64 * meta.xdelta;
        let timestamp = start + chrono::Duration::nanoseconds((offset * 1e9) as i64);
        frames += values.len() / per_frame;
        pending = Some(SampleBlock::new(values, timestamp, meta.clone()));
    }

    let mut last =
        pending.unwrap_or_else(|| SampleBlock::new(Vec::new(), start, meta.clone()));
    last.eos = true;
    info!(frames, "input stream closed");
    send(tx, last)
}

fn send(tx: &Sender<SampleBlock>, block: SampleBlock) -> tune_filter_decimate::Result<()> {
    tx.send(block)
        .map_err(|_| tune_filter_decimate::Error::format("stage input closed"))
}

fn write_output(
    args: &Args,
    stream_id: &str,
    collected: &Collected,
) -> tune_filter_decimate::Result<Option<PathBuf>> {
    let Some(meta) = &collected.metadata else {
        warn!("stage produced no output metadata, nothing written");
        return Ok(None);
    };
    let rate = meta.sample_rate();
    if rate.fract().abs() > 1e-6 {
        warn!(rate, "output rate is not an integer, WAV header rate is rounded");
    }
    let filename = output::generate_filename(stream_id, rate, Local::now());
    let path = args.output_dir.join(filename);
    if args.float32 {
        output::write_iq_wav_float32(&path, &collected.samples, rate.round() as u32)?;
    } else {
        output::write_iq_wav(&path, &collected.samples, rate.round() as u32)?;
    }
    Ok(Some(path))
}

fn stream_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init(args.verbose, args.log_format);

    if args.block_len == 0 {
        eprintln!("Error: --block-len must be greater than 0");
        std::process::exit(1);
    }

    std::fs::create_dir_all(&args.output_dir)?;

    let config = ConfigHandle::new(args.build_properties()?);
    let (tx, source) = ChannelSource::bounded(16);
    let (sink, events) = ChannelSink::unbounded();
    let collector = thread::spawn(move || collect_output(events));

    let mut stage = Stage::new(config.clone());
    stage.start(source, sink)?;

    let stream_id = match (&args.input_file, &args.stream) {
        (Some(input_path), None) => {
            info!(file = %input_path.display(), "processing file");
            let (values, wav) = input::read_wav(input_path)?;
            let stream_id = stream_name(input_path);
            let meta = args.metadata(&stream_id, wav.sample_rate as f64, wav.complex);
            feed_values(&tx, &values, &meta, args.block_len)?;
            stream_id
        }
        (None, Some(addr)) => {
            info!(addr = %addr, format = ?args.format, "connecting to stream");
            let mut reader = RawStreamReader::connect(addr, args.format)?;
            let meta = args.metadata(addr, args.rate as f64, !args.real);
            feed_stream(&tx, &mut reader, &meta, args.block_len)?;
            addr.clone()
        }
        (None, None) => {
            eprintln!("Error: Must specify either an input file or --stream <host:port>");
            std::process::exit(1);
        }
        (Some(_), Some(_)) => {
            eprintln!("Error: Cannot specify both input file and --stream");
            std::process::exit(1);
        }
    };

    // Let the worker take the last block before asking it to stop
    while !tx.is_empty() {
        thread::sleep(Duration::from_millis(1));
    }
    let engine = stage.stop();
    drop(stage);

    let collected = collector
        .join()
        .map_err(|_| "output collector panicked")?;
    if let Some(path) = write_output(&args, &stream_id, &collected)? {
        info!(
            path = %path.display(),
            samples = collected.samples.len(),
            "wrote output"
        );
    }
    if let Some(engine) = engine {
        info!(stats = ?engine.stats(), "done");
    }
    if args.status {
        println!("{}", serde_json::to_string_pretty(&*config.status())?);
    }

    Ok(())
}
