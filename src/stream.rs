//! Frame source adapter.
//!
//! `FrameStream` pairs the bounded queue with the two liveness flags the
//! pipeline coordinates on:
//!
//! - `ready`: the source opened successfully. Set exactly once, never reset.
//! - `active`: ingestion is still running. True from construction until the
//!   ingest loop exits, on every exit path.
//!
//! Workers key their termination off `active` + queue depth; the controller
//! keys startup off `ready`. A source that fails to open drops `active`
//! without ever setting `ready`, which is how an open failure is told apart
//! from an instantly-exhausted stream.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::frame::{Frame, FrameQueue};
use crate::pipeline::ShutdownToken;
use crate::source::FrameSource;

pub struct FrameStream {
    queue: FrameQueue,
    ready: AtomicBool,
    active: AtomicBool,
    ingested: AtomicU64,
}

impl FrameStream {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            queue: FrameQueue::new(queue_capacity),
            ready: AtomicBool::new(false),
            active: AtomicBool::new(true),
            ingested: AtomicU64::new(0),
        }
    }

    /// True once the source has opened. Never reset afterwards.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// True while the ingest loop is still running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn depth(&self) -> usize {
        self.queue.depth()
    }

    pub fn frames_ingested(&self) -> u64 {
        self.ingested.load(Ordering::SeqCst)
    }

    pub fn pop_batch(&self, max: usize) -> Result<Vec<Frame>> {
        self.queue.pop_batch(max)
    }

    /// Run the ingestion loop to completion on the current thread.
    ///
    /// Connects the source, flips `ready`, then pushes frames until the
    /// source is exhausted, a decode error occurs, or shutdown is triggered.
    /// `active` drops on every exit path, after `ready` when both happen.
    /// Returns the number of frames pushed.
    pub fn ingest<S: FrameSource>(&self, mut source: S, shutdown: &ShutdownToken) -> Result<u64> {
        let result = self.ingest_inner(&mut source, shutdown);
        self.active.store(false, Ordering::SeqCst);
        result
    }

    fn ingest_inner(&self, source: &mut dyn FrameSource, shutdown: &ShutdownToken) -> Result<u64> {
        let label = source.describe();
        source
            .connect()
            .with_context(|| format!("open frame source {label}"))?;
        self.ready.store(true, Ordering::SeqCst);

        let mut pushed = 0u64;
        while !shutdown.is_triggered() {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    return Err(err).with_context(|| format!("decode frame from {label}"))
                }
            };
            if self.queue.push(frame, shutdown)? {
                pushed += 1;
                self.ingested.store(pushed, Ordering::SeqCst);
            }
        }
        log::debug!("source {} done after {} frames", label, pushed);
        Ok(pushed)
    }
}
