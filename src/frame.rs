//! Frame type and the bounded frame queue.
//!
//! - `Frame`: one decoded unit of visual input, owned by exactly one stage at
//!   a time. Deliberately not `Clone`: a frame is moved into a single worker's
//!   batch, never shared.
//! - `FrameQueue`: fixed-capacity queue between the ingestion thread and the
//!   workers. One producer, many consumers.
//!
//! The queue MUST NOT:
//! - Drop frames silently when full (the producer blocks instead)
//! - Hand the same frame to two workers
//! - Split a batch pull across other consumers

use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::pipeline::ShutdownToken;

/// How often a blocked producer re-checks a full queue.
const PUSH_POLL_INTERVAL: Duration = Duration::from_millis(1);

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One decoded frame. `seq` is the arrival order assigned by the source.
pub struct Frame {
    pub seq: u64,
    /// Capture time in milliseconds since the epoch.
    pub epoch_ms: u64,
    pub width: u32,
    pub height: u32,
    /// Raw RGB8 pixel data.
    pub pixels: Vec<u8>,
}

// ----------------------------------------------------------------------------
// FrameQueue
// ----------------------------------------------------------------------------

/// Bounded single-producer / multi-consumer frame queue.
///
/// `depth` mirrors the queue length so readers can poll occupancy without
/// touching the lock.
pub struct FrameQueue {
    inner: Mutex<VecDeque<Frame>>,
    depth: AtomicUsize,
    capacity: usize,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            depth: AtomicUsize::new(0),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lock-free occupancy read. May lag the locked length by one update.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Push with backpressure. While the queue is full the call polls,
    /// re-checking the shutdown token each interval.
    ///
    /// Returns `Ok(true)` once the frame is enqueued, `Ok(false)` if shutdown
    /// was triggered while waiting (the frame is abandoned).
    pub fn push(&self, frame: Frame, shutdown: &ShutdownToken) -> Result<bool> {
        loop {
            {
                let mut inner = self
                    .inner
                    .lock()
                    .map_err(|_| anyhow!("frame queue lock poisoned"))?;
                if inner.len() < self.capacity {
                    inner.push_back(frame);
                    self.depth.store(inner.len(), Ordering::SeqCst);
                    return Ok(true);
                }
            }
            if shutdown.is_triggered() {
                return Ok(false);
            }
            std::thread::sleep(PUSH_POLL_INTERVAL);
        }
    }

    /// Atomically remove up to `max` frames.
    ///
    /// The whole pull happens under one lock acquisition, so the returned
    /// batch is a contiguous run of the arrival order. Returns an empty vec
    /// when the queue is empty.
    pub fn pop_batch(&self, max: usize) -> Result<Vec<Frame>> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| anyhow!("frame queue lock poisoned"))?;
        let take = max.min(inner.len());
        let batch: Vec<Frame> = inner.drain(..take).collect();
        self.depth.store(inner.len(), Ordering::SeqCst);
        Ok(batch)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(seq: u64) -> Frame {
        Frame {
            seq,
            epoch_ms: seq * 33,
            width: 4,
            height: 4,
            pixels: vec![0u8; 48],
        }
    }

    #[test]
    fn pop_batch_takes_contiguous_prefix() -> Result<()> {
        let queue = FrameQueue::new(8);
        let shutdown = ShutdownToken::new();
        for seq in 0..5 {
            assert!(queue.push(frame(seq), &shutdown)?);
        }
        assert_eq!(queue.depth(), 5);

        let batch = queue.pop_batch(3)?;
        let seqs: Vec<u64> = batch.iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(queue.depth(), 2);

        let rest = queue.pop_batch(10)?;
        let seqs: Vec<u64> = rest.iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![3, 4]);
        assert!(queue.pop_batch(10)?.is_empty());
        Ok(())
    }

    #[test]
    fn full_queue_blocks_until_space() -> Result<()> {
        let queue = FrameQueue::new(2);
        let shutdown = ShutdownToken::new();
        assert_eq!(queue.capacity(), 2);
        assert!(queue.push(frame(0), &shutdown)?);
        assert!(queue.push(frame(1), &shutdown)?);

        std::thread::scope(|s| -> Result<()> {
            let queue = &queue;
            let shutdown = &shutdown;
            let producer = s.spawn(move || queue.push(frame(2), shutdown));

            // Producer is parked against the full queue until we pop.
            std::thread::sleep(Duration::from_millis(20));
            assert_eq!(queue.depth(), 2);
            let drained = queue.pop_batch(1)?;
            assert_eq!(drained[0].seq, 0);

            let pushed = producer
                .join()
                .map_err(|_| anyhow!("producer thread panicked"))??;
            assert!(pushed);
            Ok(())
        })?;

        assert_eq!(queue.depth(), 2);
        let seqs: Vec<u64> = queue.pop_batch(4)?.iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        Ok(())
    }

    #[test]
    fn shutdown_releases_blocked_push() -> Result<()> {
        let queue = FrameQueue::new(1);
        let shutdown = ShutdownToken::new();
        assert!(queue.push(frame(0), &shutdown)?);

        shutdown.trigger();
        let pushed = queue.push(frame(1), &shutdown)?;
        assert!(!pushed, "push against a full queue must yield to shutdown");
        assert_eq!(queue.depth(), 1);
        Ok(())
    }
}
