//! Synthetic frame source (`stub://`) for tests and demos.

use anyhow::Result;
use std::time::Duration;

use crate::frame::Frame;
use crate::source::{epoch_ms, FrameSource};

const DEFAULT_WIDTH: u32 = 64;
const DEFAULT_HEIGHT: u32 = 48;

/// Emits a fixed number of deterministic frames.
///
/// Pixel content is derived from the sequence number alone, so two runs over
/// the same settings produce byte-identical frames. Pass `u64::MAX` for an
/// effectively endless stream (cancellation tests).
pub struct SyntheticSource {
    name: String,
    frames: u64,
    emitted: u64,
    width: u32,
    height: u32,
    frame_interval: Option<Duration>,
}

impl SyntheticSource {
    pub fn new(name: &str, frames: u64) -> Self {
        Self {
            name: name.to_string(),
            frames,
            emitted: 0,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            frame_interval: None,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Fixed pause before each frame, to pace emission like a live camera.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    fn generate_pixels(&self, seq: u64) -> Vec<u8> {
        let pixel_count = (self.width * self.height * 3) as usize; // RGB
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + seq) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("stub://{}", self.name)
    }

    fn connect(&mut self) -> Result<()> {
        // Synthetic sources are always "connected".
        log::info!(
            "SyntheticSource: connected to stub://{} ({} frames)",
            self.name,
            self.frames
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.emitted >= self.frames {
            return Ok(None);
        }
        if let Some(interval) = self.frame_interval {
            std::thread::sleep(interval);
        }
        let seq = self.emitted;
        self.emitted += 1;
        Ok(Some(Frame {
            seq,
            epoch_ms: epoch_ms()?,
            width: self.width,
            height: self.height,
            pixels: self.generate_pixels(seq),
        }))
    }
}
