//! Batch image runner.
//!
//! Pre-loads a directory of still images and drives `recognize_batch` over
//! fixed-size chunks. No queue, no workers: this mode exercises the engine's
//! batch call directly and checks its per-frame result cardinality.

use anyhow::{anyhow, Result};
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::engine::{PlateEngine, RecognizedFrame};
use crate::frame::Frame;
use crate::source::image_dir;

/// Totals for one batch-mode run.
#[derive(Clone, Debug)]
pub struct BatchReport {
    pub images: usize,
    pub batches: usize,
    pub plate_reads: u64,
    pub elapsed: Duration,
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "images={} batches={} plate_reads={} elapsed={:.2}s",
            self.images,
            self.batches,
            self.plate_reads,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Load every decodable image under `dir`, sorted by filename, as frames
/// with dense sequence numbers. Undecodable files are skipped with a
/// warning; a directory yielding nothing is an error.
pub fn load_image_frames(dir: &Path) -> Result<Vec<Frame>> {
    let files = image_dir::list_image_files(dir)?;
    let mut frames = Vec::with_capacity(files.len());
    for path in &files {
        match image_dir::load_image_frame(path, frames.len() as u64) {
            Ok(frame) => frames.push(frame),
            Err(err) => log::warn!("skipping {}: {:#}", path.display(), err),
        }
    }
    if frames.is_empty() {
        return Err(anyhow!("no decodable images under {}", dir.display()));
    }
    Ok(frames)
}

/// Run the engine over `frames` in chunks of `batch_size`.
///
/// The engine must return exactly one result per input frame; anything else
/// fails the run. Chunking is ceil-division: a final short chunk still goes
/// through as its own batch.
pub fn run_batches<E: PlateEngine>(
    engine: &mut E,
    frames: &[Frame],
    batch_size: usize,
) -> Result<(Vec<RecognizedFrame>, BatchReport)> {
    if batch_size == 0 {
        return Err(anyhow!("batch_size must be at least 1"));
    }
    let started = Instant::now();
    let mut recognized = Vec::with_capacity(frames.len());
    let mut batches = 0usize;

    for chunk in frames.chunks(batch_size) {
        let results = engine.recognize_batch(chunk)?;
        if results.len() != chunk.len() {
            return Err(anyhow!(
                "engine returned {} results for a batch of {} frames",
                results.len(),
                chunk.len()
            ));
        }
        batches += 1;
        recognized.extend(results);
    }

    let plate_reads = recognized
        .iter()
        .map(|frame| frame.plates.len() as u64)
        .sum();
    Ok((
        recognized,
        BatchReport {
            images: frames.len(),
            batches,
            plate_reads,
            elapsed: started.elapsed(),
        },
    ))
}
