use clap::ValueEnum;
use std::io::{BufReader, ErrorKind, Read};
use std::net::TcpStream;

use crate::error::Result;

/// Encoding of a raw little-endian sample stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StreamFormat {
    Int8,
    Int16,
    Int32,
    #[default]
    Float32,
}

impl StreamFormat {
    /// Bytes per single value (one of I or Q, or one real sample)
    pub fn bytes_per_value(&self) -> usize {
        match self {
            StreamFormat::Int8 => 1,
            StreamFormat::Int16 => 2,
            StreamFormat::Int32 | StreamFormat::Float32 => 4,
        }
    }

    fn decode(&self, bytes: &[u8]) -> f32 {
        match self {
            StreamFormat::Int8 => (bytes[0] as i8) as f32 / 128.0,
            StreamFormat::Int16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 32768.0,
            StreamFormat::Int32 => {
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32 / 2147483648.0
            }
            StreamFormat::Float32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }
}

/// Raw sample values from a socket, file or pipe
pub struct RawStreamReader<R> {
    reader: BufReader<R>,
    format: StreamFormat,
    buffer: Vec<u8>,
}

impl RawStreamReader<TcpStream> {
    /// Connect to a TCP sample server such as the SDR++ network sink
    pub fn connect(addr: &str, format: StreamFormat) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Ok(Self::new(stream, format))
    }
}

impl<R: Read> RawStreamReader<R> {
    pub fn new(reader: R, format: StreamFormat) -> Self {
        Self {
            reader: BufReader::new(reader),
            format,
            buffer: Vec::new(),
        }
    }

    /// Read up to `num_values` values. A short read at the end of the stream
    /// returns what arrived (minus a trailing partial value); `None` once the
    /// stream is exhausted.
    pub fn read_chunk(&mut self, num_values: usize) -> Result<Option<Vec<f32>>> {
        let width = self.format.bytes_per_value();
        self.buffer.resize(num_values * width, 0);

        let mut filled = 0;
        while filled < self.buffer.len() {
            match self.reader.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let whole = filled / width;
        if whole == 0 {
            return Ok(None);
        }
        let format = self.format;
        Ok(Some(
            self.buffer[..whole * width]
                .chunks_exact(width)
                .map(|b| format.decode(b))
                .collect(),
        ))
    }
}
