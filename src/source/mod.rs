//! Frame sources.
//!
//! A `FrameSource` is the decode boundary: everything upstream of the queue.
//! Sources are plain pull-style producers; the pipeline owns the threading.
//!
//! Bundled sources:
//! - `SyntheticSource`: deterministic frames for tests and demos (`stub://`)
//! - `ImageDirSource`: still images streamed from a directory
//!
//! A real camera or video-file source implements the same trait.

use anyhow::Result;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::frame::Frame;

pub mod image_dir;
pub mod synthetic;

pub use image_dir::ImageDirSource;
pub use synthetic::SyntheticSource;

/// Pull-style producer of decoded frames.
pub trait FrameSource: Send {
    /// Human-readable identifier for logs and errors.
    fn describe(&self) -> String;

    /// Open the source. A failure here is fatal to the whole run; the
    /// pipeline never treats a failed open as an empty stream.
    fn connect(&mut self) -> Result<()>;

    /// Decode the next frame. `Ok(None)` means the stream ended normally.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

pub(crate) fn epoch_ms() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis() as u64)
}
