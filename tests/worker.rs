//! End-to-end tests of the worker thread with channel ports

mod helpers;

use std::time::Duration;

use helpers::{complex_tones, split_blocks};
use tune_filter_decimate::{
    ChannelSink, ChannelSource, CollectingSink, ConfigHandle, Engine, SinkEvent, Stage,
    StreamMetadata,
};

const TIMEOUT: Duration = Duration::from_secs(10);

/// Receive events until the end-of-stream block arrives
fn drain_until_eos(rx: &crossbeam::channel::Receiver<SinkEvent>) -> Vec<SinkEvent> {
    let mut events = Vec::new();
    loop {
        let event = rx.recv_timeout(TIMEOUT).expect("worker output timed out");
        let done = matches!(&event, SinkEvent::Block(b) if b.eos);
        events.push(event);
        if done {
            return events;
        }
    }
}

#[test]
fn test_worker_matches_direct_engine() {
    let meta = StreamMetadata::new("live", 250_000.0, true);
    let values = complex_tones(&[(0.05, 1.0), (-0.2, 0.5)], 25_000);
    let mut blocks = split_blocks(&values, &meta, &[2048, 512, 3000]);
    blocks.last_mut().unwrap().eos = true;

    let config = ConfigHandle::default();
    config.set_tuning_norm(0.05);

    let mut direct = Engine::new(config.clone());
    let mut expected = CollectingSink::new();
    for block in blocks.clone() {
        direct.process_block(block, &mut expected);
    }

    let (tx, source) = ChannelSource::bounded(4);
    let (sink, rx) = ChannelSink::unbounded();
    let mut stage = Stage::new(config.clone());
    stage.start(source, sink).unwrap();
    for block in blocks {
        tx.send(block).unwrap();
    }
    let events = drain_until_eos(&rx);
    let engine = stage.stop().unwrap();

    assert_eq!(events, expected.events);
    assert_eq!(engine.stats().filter_rebuilds, 1);
}

#[test]
fn test_property_change_between_blocks() {
    let meta = StreamMetadata::new("live", 100_000.0, true);
    let values = complex_tones(&[(0.0, 1.0)], 4000);
    let blocks = split_blocks(&values, &meta, &[1000]);

    let config = ConfigHandle::default();
    let (tx, source) = ChannelSource::bounded(4);
    let (sink, rx) = ChannelSink::unbounded();
    let mut stage = Stage::new(config.clone());
    stage.start(source, sink).unwrap();

    let mut blocks = blocks.into_iter();
    tx.send(blocks.next().unwrap()).unwrap();
    assert!(matches!(rx.recv_timeout(TIMEOUT), Ok(SinkEvent::Metadata(_))));
    assert!(matches!(rx.recv_timeout(TIMEOUT), Ok(SinkEvent::Block(_))));

    config.set_desired_output_rate(25_000.0);
    let mut last = blocks.next().unwrap();
    last.eos = true;
    tx.send(last).unwrap();

    let events = drain_until_eos(&rx);
    let republished = events.iter().find_map(|e| match e {
        SinkEvent::Metadata(m) => Some(m.sample_rate()),
        SinkEvent::Block(_) => None,
    });
    assert_eq!(republished, Some(25_000.0));
    assert_eq!(config.status().decimation_factor, 4);

    let engine = stage.stop().unwrap();
    assert_eq!(engine.stats().filter_rebuilds, 2);
}
