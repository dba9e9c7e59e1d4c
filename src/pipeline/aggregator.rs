//! Shared result store, realized as message passing.
//!
//! Workers never contend on a lock for results: each holds a cloned
//! `ResultSink` and sends its drained buffer as one channel message. The
//! controller collects everything with `snapshot` after all workers have
//! joined, so the read is trivially race-free and nothing can be lost
//! mid-flush.

use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, Sender};

use crate::engine::GroupBatch;

/// Collects flushed group batches from all workers.
pub struct ResultAggregator {
    tx: Sender<Vec<GroupBatch>>,
    rx: Receiver<Vec<GroupBatch>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// A sender handle for one worker. Cheap to clone.
    pub fn sink(&self) -> ResultSink {
        ResultSink {
            tx: self.tx.clone(),
        }
    }

    /// Consume the aggregator and return every flushed batch.
    ///
    /// Messages from one sender arrive in send order, so a worker's batches
    /// appear in the order it flushed them. Call only after the workers have
    /// been joined; any sink still alive would make this block.
    pub fn snapshot(self) -> Vec<GroupBatch> {
        let Self { tx, rx } = self;
        drop(tx);
        rx.into_iter().flatten().collect()
    }
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker-side handle: one `flush` per drained local buffer.
#[derive(Clone)]
pub struct ResultSink {
    tx: Sender<Vec<GroupBatch>>,
}

impl ResultSink {
    /// Hand a drained worker-local buffer to the aggregator. The whole
    /// buffer travels as one message; an empty buffer is a no-op.
    pub fn flush(&self, batches: Vec<GroupBatch>) -> Result<()> {
        if batches.is_empty() {
            return Ok(());
        }
        self.tx
            .send(batches)
            .map_err(|_| anyhow!("result aggregator receiver dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GroupResult;

    fn group(track: u64) -> GroupResult {
        GroupResult {
            plate: format!("SYN{track:04}"),
            confidence: 92.5,
            country: "us".to_string(),
            frame_start: track,
            frame_end: track,
            frame_count: 1,
            epoch_start_ms: 0,
            epoch_end_ms: 0,
        }
    }

    #[test]
    fn flushes_concatenate_in_call_order() -> Result<()> {
        let aggregator = ResultAggregator::new();
        let sink = aggregator.sink();

        sink.flush(vec![vec![group(3)], vec![group(4)], vec![group(5)]])?;
        sink.flush(vec![vec![group(2)]])?;
        drop(sink);

        let batches = aggregator.snapshot();
        let tracks: Vec<u64> = batches.iter().flatten().map(|g| g.frame_start).collect();
        assert_eq!(tracks, vec![3, 4, 5, 2]);
        Ok(())
    }

    #[test]
    fn empty_flush_sends_nothing() -> Result<()> {
        let aggregator = ResultAggregator::new();
        let sink = aggregator.sink();
        sink.flush(Vec::new())?;
        drop(sink);
        assert!(aggregator.snapshot().is_empty());
        Ok(())
    }

    #[test]
    fn empty_group_batches_survive_the_trip() -> Result<()> {
        // A processed batch that completed no group still contributes its
        // (empty) drain entry.
        let aggregator = ResultAggregator::new();
        let sink = aggregator.sink();
        sink.flush(vec![Vec::new(), vec![group(1)], Vec::new()])?;
        drop(sink);

        let batches = aggregator.snapshot();
        assert_eq!(batches.len(), 3);
        assert!(batches[0].is_empty());
        assert_eq!(batches[1][0].plate, "SYN0001");
        Ok(())
    }

    #[test]
    fn concurrent_sinks_lose_nothing() -> Result<()> {
        let aggregator = ResultAggregator::new();
        std::thread::scope(|s| {
            for worker in 0..4u64 {
                let sink = aggregator.sink();
                s.spawn(move || {
                    for i in 0..25u64 {
                        sink.flush(vec![vec![group(worker * 100 + i)]]).unwrap();
                    }
                });
            }
        });

        let total: usize = aggregator.snapshot().iter().map(Vec::len).sum();
        assert_eq!(total, 100);
        Ok(())
    }
}
