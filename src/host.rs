//! Ports connecting the engine to whatever feeds and consumes it.
//!
//! The engine only sees [`BlockSource`] and [`BlockSink`]. The crossbeam
//! channel adapters let a producer thread (a file reader, a socket) hand
//! blocks to the worker and collect its output on another thread.

use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use rustfft::num_complex::Complex;
use tracing::debug;

use crate::input::{SampleBlock, StreamMetadata};

/// One block of decimated complex output
#[derive(Debug, Clone, PartialEq)]
pub struct OutputBlock {
    pub stream_id: String,
    pub samples: Vec<Complex<f32>>,
    /// Time of the first output sample, corrected for filter delay
    pub timestamp: DateTime<Utc>,
    pub eos: bool,
}

pub trait BlockSource {
    /// Next block if one arrives within `timeout`; a zero timeout never blocks.
    fn poll_block(&mut self, timeout: Duration) -> Option<SampleBlock>;

    /// Metadata of the streams currently open on this port
    fn active_metadata(&self) -> Vec<StreamMetadata> {
        Vec::new()
    }
}

pub trait BlockSink {
    fn publish_metadata(&mut self, metadata: &StreamMetadata);
    fn push_block(&mut self, block: OutputBlock);
}

/// What a [`ChannelSink`] or [`CollectingSink`] delivers downstream
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Metadata(StreamMetadata),
    Block(OutputBlock),
}

pub struct ChannelSource {
    rx: Receiver<SampleBlock>,
    active: Vec<StreamMetadata>,
}

impl ChannelSource {
    pub fn new(rx: Receiver<SampleBlock>) -> Self {
        Self {
            rx,
            active: Vec::new(),
        }
    }

    /// Bounded queue; the producer blocks when `capacity` blocks are pending.
    pub fn bounded(capacity: usize) -> (Sender<SampleBlock>, Self) {
        let (tx, rx) = channel::bounded(capacity);
        (tx, Self::new(rx))
    }

    /// Announce streams that are already open when the stage starts.
    pub fn with_active_metadata(mut self, metadata: Vec<StreamMetadata>) -> Self {
        self.active = metadata;
        self
    }
}

impl BlockSource for ChannelSource {
    fn poll_block(&mut self, timeout: Duration) -> Option<SampleBlock> {
        if timeout.is_zero() {
            match self.rx.try_recv() {
                Ok(block) => Some(block),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
            }
        } else {
            match self.rx.recv_timeout(timeout) {
                Ok(block) => Some(block),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
            }
        }
    }

    fn active_metadata(&self) -> Vec<StreamMetadata> {
        self.active.clone()
    }
}

pub struct ChannelSink {
    tx: Sender<SinkEvent>,
}

impl ChannelSink {
    pub fn unbounded() -> (Self, Receiver<SinkEvent>) {
        let (tx, rx) = channel::unbounded();
        (Self { tx }, rx)
    }

    fn send(&self, event: SinkEvent) {
        if self.tx.send(event).is_err() {
            debug!("output receiver dropped, discarding");
        }
    }
}

impl BlockSink for ChannelSink {
    fn publish_metadata(&mut self, metadata: &StreamMetadata) {
        self.send(SinkEvent::Metadata(metadata.clone()));
    }

    fn push_block(&mut self, block: OutputBlock) {
        self.send(SinkEvent::Block(block));
    }
}

/// Sink that records everything in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub events: Vec<SinkEvent>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(&self) -> impl Iterator<Item = &StreamMetadata> {
        self.events.iter().filter_map(|e| match e {
            SinkEvent::Metadata(m) => Some(m),
            SinkEvent::Block(_) => None,
        })
    }

    pub fn blocks(&self) -> impl Iterator<Item = &OutputBlock> {
        self.events.iter().filter_map(|e| match e {
            SinkEvent::Block(b) => Some(b),
            SinkEvent::Metadata(_) => None,
        })
    }

    /// All output samples in push order
    pub fn samples(&self) -> Vec<Complex<f32>> {
        self.blocks()
            .flat_map(|b| b.samples.iter().copied())
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl BlockSink for CollectingSink {
    fn publish_metadata(&mut self, metadata: &StreamMetadata) {
        self.events.push(SinkEvent::Metadata(metadata.clone()));
    }

    fn push_block(&mut self, block: OutputBlock) {
        self.events.push(SinkEvent::Block(block));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: &str) -> SampleBlock {
        SampleBlock::new(
            vec![0.0; 4],
            DateTime::<Utc>::UNIX_EPOCH,
            StreamMetadata::new(id, 1000.0, true),
        )
    }

    #[test]
    fn test_channel_source_poll() {
        let (tx, mut source) = ChannelSource::bounded(4);
        assert!(source.poll_block(Duration::ZERO).is_none());

        tx.send(block("a")).unwrap();
        let got = source.poll_block(Duration::ZERO).unwrap();
        assert_eq!(got.stream_id(), "a");

        drop(tx);
        assert!(source.poll_block(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn test_active_metadata() {
        let (_tx, source) = ChannelSource::bounded(1);
        let source = source.with_active_metadata(vec![StreamMetadata::new("x", 1.0, true)]);
        assert_eq!(source.active_metadata()[0].stream_id, "x");
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (mut sink, rx) = ChannelSink::unbounded();
        sink.publish_metadata(&StreamMetadata::new("a", 1.0, true));
        assert!(matches!(rx.try_recv(), Ok(SinkEvent::Metadata(_))));
        drop(rx);
        sink.publish_metadata(&StreamMetadata::new("a", 1.0, true));
    }

    #[test]
    fn test_collecting_sink_samples() {
        let mut sink = CollectingSink::new();
        for n in [2, 3] {
            sink.push_block(OutputBlock {
                stream_id: "a".into(),
                samples: vec![Complex::new(1.0, 0.0); n],
                timestamp: DateTime::<Utc>::UNIX_EPOCH,
                eos: false,
            });
        }
        assert_eq!(sink.samples().len(), 5);
        assert_eq!(sink.metadata().count(), 0);
    }
}
