//! Worker thread driving the engine.
//!
//! One thread polls the source without blocking, runs each block through the
//! [`Engine`] to completion and backs off briefly when there is nothing to
//! do. Stopping is cooperative: the flag is checked between blocks only.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ConfigHandle;
use crate::engine::Engine;
use crate::error::Result;
use crate::host::{BlockSink, BlockSource};

/// Sleep between polls of an empty source
pub const IDLE_BACKOFF: Duration = Duration::from_millis(1);

pub struct Stage {
    config: ConfigHandle,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<Engine>>,
}

impl Stage {
    pub fn new(config: ConfigHandle) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Seed the configuration from the source's open streams and start the
    /// worker. Starting a running stage does nothing.
    pub fn start<S, K>(&mut self, source: S, sink: K) -> Result<()>
    where
        S: BlockSource + Send + 'static,
        K: BlockSink + Send + 'static,
    {
        if self.worker.is_some() {
            debug!("stage already running");
            return Ok(());
        }

        let mut engine = Engine::new(self.config.clone());
        on_start(&mut engine, &source);

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let handle = thread::Builder::new()
            .name("tfd-worker".into())
            .spawn(move || run(engine, source, sink, &running))?;
        self.worker = Some(handle);
        info!("stage started");
        Ok(())
    }

    /// Ask the worker to finish its current block and exit. Returns the
    /// engine for inspection, or `None` if the stage was not running or the
    /// worker panicked.
    pub fn stop(&mut self) -> Option<Engine> {
        let handle = self.worker.take()?;
        self.running.store(false, Ordering::Release);
        match handle.join() {
            Ok(engine) => {
                info!(stats = ?engine.stats(), "stage stopped");
                Some(engine)
            }
            Err(_) => {
                warn!("worker thread panicked");
                None
            }
        }
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        self.stop();
    }
}

fn on_start<S: BlockSource>(engine: &mut Engine, source: &S) {
    let active = source.active_metadata();
    if active.len() > 1 {
        warn!(
            count = active.len(),
            "more than one active input stream, configuring from the first"
        );
    }
    if let Some(metadata) = active.first() {
        engine.prime(metadata);
    }
}

fn run<S: BlockSource, K: BlockSink>(
    mut engine: Engine,
    mut source: S,
    mut sink: K,
    running: &AtomicBool,
) -> Engine {
    while running.load(Ordering::Acquire) {
        match source.poll_block(Duration::ZERO) {
            Some(block) => {
                engine.process_block(block, &mut sink);
            }
            None => thread::sleep(IDLE_BACKOFF),
        }
    }
    engine
}
