//! platestream
//!
//! Harness for exercising streaming license-plate recognition engines under
//! varying concurrency configurations.
//!
//! # Architecture
//!
//! One ingestion thread decodes frames from a [`FrameSource`] into a bounded
//! queue. N workers pull batches off the queue, hand them to a per-worker
//! [`PlateEngine`], and drain completed plate groups into worker-local
//! buffers that flush to a channel-backed aggregator. The controller owns
//! the lifecycle: it waits for the source to open, builds every engine
//! before spawning a single worker, joins everything inside one thread
//! scope, and only then snapshots the results.
//!
//! Guarantees the pipeline upholds:
//!
//! 1. **No loss, no duplication**: each frame is processed by at most one
//!    worker; a full queue blocks the producer rather than dropping.
//! 2. **Order per worker**: a worker's group emission order survives the
//!    local buffer and the aggregator.
//! 3. **Drain before done**: after the source ends, queued frames are still
//!    processed and every buffer is flushed before the run reports.
//! 4. **Fail fast on init**: one bad engine aborts the run before any worker
//!    starts; a source that cannot open is an error, not an empty run.
//!
//! # Module Structure
//!
//! - `config`: pipeline and engine settings
//! - `frame`: frame type + bounded queue
//! - `source`: frame sources (synthetic, image directory)
//! - `engine`: recognition trait + deterministic stub engine
//! - `stream`: frame source adapter (queue + liveness flags + ingest loop)
//! - `pipeline`: controller, workers, aggregator, shutdown token
//! - `batch`: batch image runner
//! - `sink`: JSON-lines output

pub mod batch;
pub mod config;
pub mod engine;
pub mod frame;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod stream;

pub use batch::{load_image_frames, run_batches, BatchReport};
pub use config::{EngineConfig, HwAccel, PipelineConfig};
pub use engine::{
    GroupBatch, GroupResult, PlateCandidate, PlateEngine, RecognizedFrame, StubEngine,
};
pub use frame::{Frame, FrameQueue};
pub use pipeline::{
    run, EngineInitError, ResultAggregator, ResultSink, RunReport, ShutdownToken,
    SourceOpenError, StreamOutcome, WorkerStats, FLUSH_THRESHOLD,
};
pub use sink::{write_group_batches, write_recognized_frames};
pub use source::{FrameSource, ImageDirSource, SyntheticSource};
pub use stream::FrameStream;
