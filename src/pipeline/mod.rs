//! Pipeline controller.
//!
//! `run` drives one streaming session: spawn the ingest thread, wait for the
//! source to open, construct one engine per worker, run the workers until the
//! stream drains, join everything, then snapshot the aggregator.
//!
//! Lifecycle rules the controller enforces:
//! - All engines are constructed before the first worker spawns. Any
//!   construction failure (or an engine reporting unloaded) aborts the whole
//!   run; there are no partial-worker sessions.
//! - Every return path joins the ingest thread and all workers. The whole
//!   session lives inside one thread scope, so handles cannot leak.
//! - The aggregator snapshot is taken only after all workers have joined;
//!   every flushed buffer, including final partial ones, is in it.
//! - A source that fails to open is a hard error, not an empty run. A decode
//!   error after a successful open only ends ingestion; workers still drain
//!   what was queued.

use anyhow::{anyhow, Result};
use std::fmt;
use std::time::{Duration, Instant};

use crate::config::PipelineConfig;
use crate::engine::{GroupBatch, PlateEngine};
use crate::source::FrameSource;
use crate::stream::FrameStream;

mod aggregator;
mod shutdown;
mod worker;

pub use aggregator::{ResultAggregator, ResultSink};
pub use shutdown::ShutdownToken;
pub use worker::{WorkerStats, FLUSH_THRESHOLD};

/// How often the controller re-checks source readiness at startup.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(10);

// ----------------------------------------------------------------------------
// Typed failures
// ----------------------------------------------------------------------------

/// Fatal failure to construct or load a recognition engine.
///
/// Raised before any worker spawns; the run is aborted as a whole.
#[derive(Clone, Debug)]
pub struct EngineInitError {
    pub worker: usize,
    pub reason: String,
}

impl fmt::Display for EngineInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "engine init failed for worker {}: {}",
            self.worker, self.reason
        )
    }
}

impl std::error::Error for EngineInitError {}

/// The frame source never became ready.
#[derive(Clone, Debug)]
pub struct SourceOpenError {
    pub source: String,
    pub reason: String,
}

impl fmt::Display for SourceOpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source {} failed to open: {}", self.source, self.reason)
    }
}

impl std::error::Error for SourceOpenError {}

// ----------------------------------------------------------------------------
// Run report
// ----------------------------------------------------------------------------

/// Totals for one streaming session.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub workers: usize,
    pub frames_ingested: u64,
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub batches: u64,
    pub groups: u64,
    pub plate_reads: u64,
    pub elapsed: Duration,
    /// True when the run ended because shutdown was triggered.
    pub interrupted: bool,
}

impl RunReport {
    fn new(workers: usize) -> Self {
        Self {
            workers,
            frames_ingested: 0,
            frames_processed: 0,
            frames_dropped: 0,
            batches: 0,
            groups: 0,
            plate_reads: 0,
            elapsed: Duration::ZERO,
            interrupted: false,
        }
    }

    fn absorb(&mut self, stats: WorkerStats) {
        self.frames_processed += stats.frames_processed;
        self.frames_dropped += stats.frames_dropped;
        self.batches += stats.batches;
        self.groups += stats.groups;
        self.plate_reads += stats.plate_reads;
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed_s = self.elapsed.as_secs_f64();
        let fps = if elapsed_s > 0.0 {
            self.frames_processed as f64 / elapsed_s
        } else {
            0.0
        };
        write!(
            f,
            "workers={} ingested={} processed={} dropped={} batches={} groups={} \
             plate_reads={} elapsed={:.2}s ({:.1} fps){}",
            self.workers,
            self.frames_ingested,
            self.frames_processed,
            self.frames_dropped,
            self.batches,
            self.groups,
            self.plate_reads,
            elapsed_s,
            fps,
            if self.interrupted { " [interrupted]" } else { "" },
        )
    }
}

/// Everything a streaming session produced.
#[derive(Debug)]
pub struct StreamOutcome {
    /// Flushed group batches, one entry per drained engine call.
    pub group_batches: Vec<GroupBatch>,
    pub report: RunReport,
}

// ----------------------------------------------------------------------------
// Controller
// ----------------------------------------------------------------------------

/// Run one streaming session to completion.
///
/// `make_engine` is invoked once per worker index with every engine built
/// up front. The worker count is `config.effective_workers()`.
pub fn run<S, E, F>(
    config: &PipelineConfig,
    source: S,
    mut make_engine: F,
    shutdown: &ShutdownToken,
) -> Result<StreamOutcome>
where
    S: FrameSource,
    E: PlateEngine,
    F: FnMut(usize) -> Result<E>,
{
    config.validate()?;
    let started = Instant::now();
    let worker_count = config.effective_workers();
    let batch_size = config.batch_size;
    let source_label = source.describe();
    let stream = FrameStream::new(config.queue_capacity);
    let aggregator = ResultAggregator::new();

    log::info!(
        "pipeline: source {} with {} workers (batch_size={}, queue_capacity={})",
        source_label,
        worker_count,
        batch_size,
        config.queue_capacity
    );

    let report = std::thread::scope(|s| -> Result<RunReport> {
        let stream = &stream;
        log::debug!("pipeline: adapter starting");
        let ingest_handle = s.spawn(move || stream.ingest(source, shutdown));

        // Wait for the source to open. Leaves the loop with `ready` set, or
        // returns: interrupted (Ok) or open failure (Err).
        loop {
            if shutdown.is_triggered() {
                log::info!("pipeline: interrupted before the source became ready");
                let mut report = RunReport::new(0);
                report.frames_ingested = stream.frames_ingested();
                report.interrupted = true;
                report.elapsed = started.elapsed();
                return Ok(report);
            }
            if stream.is_ready() {
                break;
            }
            if !stream.is_active() {
                // The adapter exited; it may still have flipped `ready` just
                // before going inactive (an instantly-exhausted source).
                if stream.is_ready() {
                    break;
                }
                let reason = match ingest_handle.join() {
                    Ok(Ok(_)) => "source stopped before signalling readiness".to_string(),
                    Ok(Err(err)) => format!("{err:#}"),
                    Err(_) => "ingest thread panicked".to_string(),
                };
                return Err(SourceOpenError {
                    source: source_label.clone(),
                    reason,
                }
                .into());
            }
            std::thread::sleep(READY_POLL_INTERVAL);
        }
        log::debug!("pipeline: adapter ready (depth={})", stream.depth());

        // Build every engine before spawning a single worker. A failure here
        // aborts the session; triggering shutdown first releases a producer
        // that may be parked against a full queue.
        let mut engines = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let engine = match make_engine(worker_id) {
                Ok(engine) => engine,
                Err(err) => {
                    shutdown.trigger();
                    return Err(EngineInitError {
                        worker: worker_id,
                        reason: format!("{err:#}"),
                    }
                    .into());
                }
            };
            if !engine.is_loaded() {
                shutdown.trigger();
                return Err(EngineInitError {
                    worker: worker_id,
                    reason: "engine reported not loaded".to_string(),
                }
                .into());
            }
            engines.push(engine);
        }

        let mut worker_handles = Vec::with_capacity(worker_count);
        for (worker_id, engine) in engines.into_iter().enumerate() {
            let sink = aggregator.sink();
            worker_handles.push(s.spawn(move || {
                worker::run_worker(worker_id, stream, engine, sink, shutdown, batch_size)
            }));
        }
        log::debug!("pipeline: {} workers running", worker_count);

        let mut report = RunReport::new(worker_count);
        for (worker_id, handle) in worker_handles.into_iter().enumerate() {
            let stats = handle
                .join()
                .map_err(|_| anyhow!("worker {} thread panicked", worker_id))??;
            report.absorb(stats);
        }
        log::debug!("pipeline: workers drained and joined");

        match ingest_handle
            .join()
            .map_err(|_| anyhow!("ingest thread panicked"))?
        {
            Ok(pushed) => log::debug!("pipeline: ingest joined after {} frames", pushed),
            // Open succeeded, so a later decode failure only ends ingestion;
            // whatever was queued has already been drained above.
            Err(err) => log::warn!("pipeline: ingestion ended early: {:#}", err),
        }

        report.frames_ingested = stream.frames_ingested();
        report.interrupted = shutdown.is_triggered();
        report.elapsed = started.elapsed();
        Ok(report)
    })?;

    let group_batches = aggregator.snapshot();
    log::info!(
        "pipeline: done ({} groups in {} drains)",
        group_batches.iter().map(Vec::len).sum::<usize>(),
        group_batches.len()
    );
    Ok(StreamOutcome {
        group_batches,
        report,
    })
}
