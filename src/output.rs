use chrono::{DateTime, Local};
use hound::{SampleFormat, WavSpec, WavWriter};
use rustfft::num_complex::Complex;
use std::path::Path;

use crate::error::Result;

/// Write complex samples as stereo int16 PCM (I=left, Q=right)
pub fn write_iq_wav<P: AsRef<Path>>(
    path: P,
    samples: &[Complex<f32>],
    sample_rate: u32,
) -> Result<()> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for sample in samples {
        // Leave a little headroom below full scale
        let i = (sample.re * 32000.0).clamp(-32768.0, 32767.0) as i16;
        let q = (sample.im * 32000.0).clamp(-32768.0, 32767.0) as i16;
        writer.write_sample(i)?;
        writer.write_sample(q)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Write complex samples as stereo float32 (for inspectrum and SDR++)
pub fn write_iq_wav_float32<P: AsRef<Path>>(
    path: P,
    samples: &[Complex<f32>],
    sample_rate: u32,
) -> Result<()> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for sample in samples {
        writer.write_sample(sample.re)?;
        writer.write_sample(sample.im)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Output file name for a processed stream, e.g.
/// `tfd_capture_10000Hz_2024-05-01_12-00-00.wav`
pub fn generate_filename(stream_id: &str, output_rate: f64, start: DateTime<Local>) -> String {
    let stem: String = stream_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!(
        "tfd_{}_{}Hz_{}.wav",
        stem,
        output_rate.round() as u64,
        start.format("%Y-%m-%d_%H-%M-%S")
    )
}
