//! Worker loop: pull batches, recognize, drain groups, flush.

use anyhow::Result;
use std::time::Duration;

use crate::engine::{GroupBatch, PlateEngine};
use crate::pipeline::aggregator::ResultSink;
use crate::pipeline::ShutdownToken;
use crate::stream::FrameStream;

/// Local buffers longer than this flush to the aggregator (strictly greater:
/// the flush happens on the 11th drained batch).
pub const FLUSH_THRESHOLD: usize = 10;

/// Backoff when the queue polls empty.
const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Counters one worker accumulates over its run.
#[derive(Clone, Copy, Debug, Default)]
pub struct WorkerStats {
    pub frames_processed: u64,
    /// Frames belonging to batches whose engine call failed.
    pub frames_dropped: u64,
    /// Batches pulled and handed to the engine, failed ones included.
    pub batches: u64,
    pub groups: u64,
    /// Candidate plate reads across all recognized frames.
    pub plate_reads: u64,
}

/// Drive one engine until the stream goes inactive and the queue drains, or
/// shutdown is triggered.
///
/// Loop contract:
/// - An empty poll sleeps briefly and retries; the engine never sees an
///   empty batch.
/// - A failed engine call drops that batch (logged, counted) but completed
///   groups from earlier batches are still drained.
/// - Every processed batch appends one drain entry to the local buffer,
///   empty or not, and the final partial buffer is always flushed.
pub(crate) fn run_worker<E: PlateEngine>(
    worker_id: usize,
    stream: &FrameStream,
    mut engine: E,
    sink: ResultSink,
    shutdown: &ShutdownToken,
    batch_size: usize,
) -> Result<WorkerStats> {
    let mut stats = WorkerStats::default();
    let mut local: Vec<GroupBatch> = Vec::new();
    log::debug!("worker {}: up (batch_size={})", worker_id, batch_size);

    while !shutdown.is_triggered() && (stream.is_active() || stream.depth() > 0) {
        let batch = stream.pop_batch(batch_size)?;
        if batch.is_empty() {
            std::thread::sleep(QUEUE_POLL_INTERVAL);
            continue;
        }

        stats.batches += 1;
        match engine.recognize_batch(&batch) {
            Ok(recognized) => {
                stats.frames_processed += batch.len() as u64;
                stats.plate_reads += recognized
                    .iter()
                    .map(|frame| frame.plates.len() as u64)
                    .sum::<u64>();
            }
            Err(err) => {
                stats.frames_dropped += batch.len() as u64;
                log::warn!(
                    "worker {}: dropping batch of {} frames: {:#}",
                    worker_id,
                    batch.len(),
                    err
                );
            }
        }

        let groups = engine.pop_completed_groups();
        stats.groups += groups.len() as u64;
        local.push(groups);
        if local.len() > FLUSH_THRESHOLD {
            log::debug!("worker {}: flushing {} drained batches", worker_id, local.len());
            sink.flush(std::mem::take(&mut local))?;
        }
    }

    if !local.is_empty() {
        sink.flush(local)?;
    }
    log::debug!(
        "worker {}: done ({} frames, {} groups, {} dropped)",
        worker_id,
        stats.frames_processed,
        stats.groups,
        stats.frames_dropped
    );
    Ok(stats)
}
