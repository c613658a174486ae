use hound::{SampleFormat, WavReader};
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

/// What a WAV recording holds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavInfo {
    pub sample_rate: u32,
    /// Stereo files are I/Q, mono files are real samples
    pub complex: bool,
    /// Sample frames (one per I/Q pair or real sample)
    pub frames: usize,
}

/// Read an IQ (stereo, I=left Q=right) or real (mono) WAV recording.
///
/// Returns the values as stored, interleaved for stereo, normalized to
/// [-1, 1] for integer formats.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, WavInfo)> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();

    let complex = match spec.channels {
        1 => false,
        2 => true,
        n => {
            return Err(Error::format(format!(
                "expected mono (real) or stereo (I/Q) WAV, got {n} channels"
            )))
        }
    };

    let info = WavInfo {
        sample_rate: spec.sample_rate,
        complex,
        frames: reader.len() as usize / spec.channels as usize,
    };

    let values = match spec.sample_format {
        SampleFormat::Float => read_float_values(reader)?,
        SampleFormat::Int => read_int_values(reader, spec.bits_per_sample)?,
    };

    Ok((values, info))
}

fn read_float_values<R: Read>(mut reader: WavReader<R>) -> Result<Vec<f32>> {
    Ok(reader.samples::<f32>().collect::<std::result::Result<_, _>>()?)
}

fn read_int_values<R: Read>(mut reader: WavReader<R>, bits: u16) -> Result<Vec<f32>> {
    let max_val = (1i64 << (bits - 1)) as f32;
    reader
        .samples::<i32>()
        .map(|s| -> Result<f32> { Ok(s? as f32 / max_val) })
        .collect()
}
