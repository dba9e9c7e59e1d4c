//! Still-image directory source.
//!
//! Streams every supported image under a directory in filename order. Used
//! both by the streaming pipeline (as a `FrameSource`) and by the batch
//! runner (which pre-loads the same files).

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use crate::frame::Frame;
use crate::source::{epoch_ms, FrameSource};

/// Frame source over a directory of still images.
///
/// `connect` fails when the directory is missing or holds no supported image,
/// so a bad path surfaces as an open failure instead of an empty run. Files
/// that fail to decode later are skipped with a warning.
pub struct ImageDirSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
    seq: u64,
}

impl ImageDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
            next: 0,
            seq: 0,
        }
    }
}

impl FrameSource for ImageDirSource {
    fn describe(&self) -> String {
        format!("dir://{}", self.dir.display())
    }

    fn connect(&mut self) -> Result<()> {
        self.files = list_image_files(&self.dir)?;
        log::info!(
            "ImageDirSource: {} images under {}",
            self.files.len(),
            self.dir.display()
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        while self.next < self.files.len() {
            let path = self.files[self.next].clone();
            self.next += 1;
            match load_image_frame(&path, self.seq) {
                Ok(mut frame) => {
                    frame.epoch_ms = epoch_ms()?;
                    self.seq += 1;
                    return Ok(Some(frame));
                }
                Err(err) => {
                    log::warn!("skipping {}: {:#}", path.display(), err);
                }
            }
        }
        Ok(None)
    }
}

/// Supported images under `dir`, sorted by filename. Errors when the
/// directory is unreadable or no candidate file exists.
pub(crate) fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("read image directory {}", dir.display()))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_supported_image(path))
        .collect();
    files.sort();
    if files.is_empty() {
        return Err(anyhow!(
            "no supported images (jpg/png) under {}",
            dir.display()
        ));
    }
    Ok(files)
}

/// Decode one image file into an RGB8 frame. `epoch_ms` is left at zero for
/// the caller to fill.
pub(crate) fn load_image_frame(path: &Path, seq: u64) -> Result<Frame> {
    let img = image::open(path).with_context(|| format!("decode {}", path.display()))?;
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(Frame {
        seq,
        epoch_ms: 0,
        width,
        height,
        pixels: rgb.into_raw(),
    })
}

fn is_supported_image(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref(),
        Some("jpg" | "jpeg" | "png")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_png(dir: &Path, name: &str, shade: u8) -> Result<()> {
        let mut img = image::RgbImage::new(4, 4);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([shade, shade, shade]);
        }
        img.save(dir.join(name))?;
        Ok(())
    }

    #[test]
    fn streams_images_in_filename_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_test_png(dir.path(), "b_frame.png", 20)?;
        write_test_png(dir.path(), "a_frame.png", 10)?;
        std::fs::write(dir.path().join("notes.txt"), "ignored")?;

        let mut source = ImageDirSource::new(dir.path());
        source.connect()?;

        let first = source.next_frame()?.expect("frame");
        assert_eq!(first.seq, 0);
        assert_eq!(first.pixels[0], 10, "a_frame.png must come first");
        let second = source.next_frame()?.expect("frame");
        assert_eq!(second.seq, 1);
        assert_eq!(second.pixels[0], 20);
        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn connect_fails_without_images() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("notes.txt"), "no images here")?;

        let mut source = ImageDirSource::new(dir.path());
        assert!(source.connect().is_err());

        let mut missing = ImageDirSource::new(dir.path().join("does_not_exist"));
        assert!(missing.connect().is_err());
        Ok(())
    }

    #[test]
    fn undecodable_file_is_skipped() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_test_png(dir.path(), "a_good.png", 5)?;
        std::fs::write(dir.path().join("b_broken.png"), b"not a png")?;
        write_test_png(dir.path(), "c_good.png", 7)?;

        let mut source = ImageDirSource::new(dir.path());
        source.connect()?;

        let first = source.next_frame()?.expect("frame");
        assert_eq!(first.pixels[0], 5);
        let second = source.next_frame()?.expect("frame");
        assert_eq!(second.pixels[0], 7);
        // Sequence numbers stay dense across the skip.
        assert_eq!(second.seq, 1);
        assert!(source.next_frame()?.is_none());
        Ok(())
    }
}
