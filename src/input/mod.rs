pub mod stream;
pub mod wav;

pub use stream::{RawStreamReader, StreamFormat};
pub use wav::{read_wav, WavInfo};

use chrono::{DateTime, Utc};

/// Keyword carrying the RF center frequency the front end collected at (Hz)
pub const COL_RF: &str = "COL_RF";
/// Keyword carrying the RF center frequency of this channel (Hz)
pub const CHAN_RF: &str = "CHAN_RF";

/// Value attached to a stream metadata keyword
#[derive(Debug, Clone, PartialEq)]
pub enum KeywordValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl KeywordValue {
    /// Read the value as an integer. Floats are rounded, text is not a number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            KeywordValue::Integer(v) => Some(*v),
            KeywordValue::Float(v) if v.is_finite() => Some(v.round() as i64),
            _ => None,
        }
    }
}

/// Ordered keyword bag travelling with a stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keywords(Vec<(String, KeywordValue)>);

impl Keywords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&KeywordValue> {
        self.0.iter().find(|(k, _)| k == id).map(|(_, v)| v)
    }

    pub fn get_i64(&self, id: &str) -> Option<i64> {
        self.get(id).and_then(KeywordValue::as_i64)
    }

    /// Overwrite an existing keyword in place, or append it
    pub fn set(&mut self, id: &str, value: KeywordValue) {
        match self.0.iter_mut().find(|(k, _)| k == id) {
            Some((_, v)) => *v = value,
            None => self.0.push((id.to_string(), value)),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeywordValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Stream descriptor travelling alongside the sample data
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMetadata {
    pub stream_id: String,
    /// Sample interval in seconds
    pub xdelta: f64,
    /// Interleaved I/Q when true, single-channel real samples otherwise
    pub complex: bool,
    pub keywords: Keywords,
}

impl StreamMetadata {
    pub fn new(stream_id: impl Into<String>, sample_rate: f64, complex: bool) -> Self {
        Self {
            stream_id: stream_id.into(),
            xdelta: 1.0 / sample_rate,
            complex,
            keywords: Keywords::new(),
        }
    }

    pub fn with_keyword(mut self, id: &str, value: KeywordValue) -> Self {
        self.keywords.set(id, value);
        self
    }

    /// Sample rate in Hz. Rates within reciprocal round-off of a whole number
    /// of Hz are reported as that whole number.
    pub fn sample_rate(&self) -> f64 {
        let rate = 1.0 / self.xdelta;
        let nearest = rate.round();
        if (rate - nearest).abs() <= rate.abs() * 1e-12 {
            nearest
        } else {
            rate
        }
    }
}

/// One block of samples as delivered by the upstream port
#[derive(Debug, Clone)]
pub struct SampleBlock {
    /// Interleaved I/Q pairs in complex mode, plain samples in real mode
    pub data: Vec<f32>,
    /// Time of the first sample in the block
    pub timestamp: DateTime<Utc>,
    pub metadata: StreamMetadata,
    /// Upstream flagged a metadata update with this block
    pub metadata_changed: bool,
    pub eos: bool,
    /// Upstream queue was flushed before this block: data has been lost
    pub queue_flushed: bool,
}

impl SampleBlock {
    pub fn new(data: Vec<f32>, timestamp: DateTime<Utc>, metadata: StreamMetadata) -> Self {
        Self {
            data,
            timestamp,
            metadata,
            metadata_changed: false,
            eos: false,
            queue_flushed: false,
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.metadata.stream_id
    }
}
