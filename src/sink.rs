//! JSON-lines output.
//!
//! One serde record per line, buffered. Writing happens after the pipeline
//! has finished, so a sink failure never invalidates computed results.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::engine::{GroupBatch, RecognizedFrame};

/// Write every group across `batches` as one JSON object per line.
/// Returns the number of records written.
pub fn write_group_batches(path: &Path, batches: &[GroupBatch]) -> Result<u64> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut written = 0u64;
    for group in batches.iter().flatten() {
        serde_json::to_writer(&mut writer, group)?;
        writer.write_all(b"\n")?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// Write per-frame recognition results (batch mode) as JSON lines.
pub fn write_recognized_frames(path: &Path, frames: &[RecognizedFrame]) -> Result<u64> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut written = 0u64;
    for frame in frames {
        serde_json::to_writer(&mut writer, frame)?;
        writer.write_all(b"\n")?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}
