//! Deterministic synthetic recognition engine.

use anyhow::{anyhow, Result};

use crate::config::EngineConfig;
use crate::engine::{GroupResult, PlateCandidate, PlateEngine, RecognizedFrame};
use crate::frame::Frame;

const DEFAULT_GROUP_WINDOW: u64 = 10;
const BASE_CONFIDENCE: f32 = 92.5;
const CONFIDENCE_STEP: f32 = 3.25;

/// Synthetic engine that maps frames onto plate tracks by sequence number.
///
/// Frames with `seq / group_window == t` belong to track `t`. A track is
/// finalized as soon as the engine sees either the last frame of its window
/// or a frame from a later window, so at `group_window = 1` every frame
/// completes its own group immediately and group totals are independent of
/// how frames were split across engines.
///
/// Plate text derives from the track id alone, which makes multi-worker
/// results comparable across runs.
pub struct StubEngine {
    country: String,
    top_n: usize,
    group_window: u64,
    loaded: bool,
    open: Option<OpenTrack>,
    completed: Vec<GroupResult>,
}

struct OpenTrack {
    track: u64,
    frame_start: u64,
    frame_end: u64,
    frame_count: u64,
    epoch_start_ms: u64,
    epoch_end_ms: u64,
}

impl StubEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            country: config.country.clone(),
            top_n: config.top_n,
            group_window: DEFAULT_GROUP_WINDOW,
            loaded: true,
            open: None,
            completed: Vec::new(),
        }
    }

    /// Engine whose model "failed to initialize": `is_loaded()` reports
    /// false and every batch call errors.
    pub fn unloaded(config: &EngineConfig) -> Self {
        Self {
            loaded: false,
            ..Self::new(config)
        }
    }

    /// Frames per synthetic plate group. Clamped to at least 1.
    pub fn with_group_window(mut self, window: u64) -> Self {
        self.group_window = window.max(1);
        self
    }

    fn candidates(&self, track: u64) -> Vec<PlateCandidate> {
        (0..self.top_n)
            .map(|rank| PlateCandidate {
                plate: candidate_plate(track, rank),
                confidence: (BASE_CONFIDENCE - CONFIDENCE_STEP * rank as f32).max(1.0),
            })
            .collect()
    }

    fn observe(&mut self, frame: &Frame) {
        let track = frame.seq / self.group_window;
        let stale = matches!(&self.open, Some(open) if open.track != track);
        if stale {
            // Per-worker frame order is monotonic, so a different track means
            // the open one can no longer grow.
            self.finalize_open();
        }
        match self.open.as_mut() {
            Some(open) => {
                open.frame_end = frame.seq;
                open.epoch_end_ms = frame.epoch_ms;
                open.frame_count += 1;
            }
            None => {
                self.open = Some(OpenTrack {
                    track,
                    frame_start: frame.seq,
                    frame_end: frame.seq,
                    frame_count: 1,
                    epoch_start_ms: frame.epoch_ms,
                    epoch_end_ms: frame.epoch_ms,
                });
            }
        }
        // The last frame of a window closes its track immediately.
        if frame.seq % self.group_window == self.group_window - 1 {
            self.finalize_open();
        }
    }

    fn finalize_open(&mut self) {
        let Some(open) = self.open.take() else {
            return;
        };
        self.completed.push(GroupResult {
            plate: candidate_plate(open.track, 0),
            confidence: BASE_CONFIDENCE,
            country: self.country.clone(),
            frame_start: open.frame_start,
            frame_end: open.frame_end,
            frame_count: open.frame_count,
            epoch_start_ms: open.epoch_start_ms,
            epoch_end_ms: open.epoch_end_ms,
        });
    }
}

impl PlateEngine for StubEngine {
    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn recognize_batch(&mut self, frames: &[Frame]) -> Result<Vec<RecognizedFrame>> {
        if !self.loaded {
            return Err(anyhow!("engine is not loaded"));
        }
        let mut recognized = Vec::with_capacity(frames.len());
        for frame in frames {
            self.observe(frame);
            let track = frame.seq / self.group_window;
            recognized.push(RecognizedFrame {
                frame_seq: frame.seq,
                plates: self.candidates(track),
            });
        }
        Ok(recognized)
    }

    fn pop_completed_groups(&mut self) -> Vec<GroupResult> {
        std::mem::take(&mut self.completed)
    }
}

fn candidate_plate(track: u64, rank: usize) -> String {
    if rank == 0 {
        format!("SYN{track:04}")
    } else {
        format!("SYN{track:04}{}", (b'A' + (rank as u8 - 1) % 26) as char)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(seq: u64) -> Frame {
        Frame {
            seq,
            epoch_ms: 1_000 + seq * 33,
            width: 4,
            height: 4,
            pixels: vec![0u8; 48],
        }
    }

    fn frames(range: std::ops::Range<u64>) -> Vec<Frame> {
        range.map(frame).collect()
    }

    #[test]
    fn window_one_completes_every_frame() -> Result<()> {
        let mut engine = StubEngine::new(&EngineConfig::default()).with_group_window(1);
        let recognized = engine.recognize_batch(&frames(0..5))?;
        assert_eq!(recognized.len(), 5);

        let groups = engine.pop_completed_groups();
        assert_eq!(groups.len(), 5);
        let plates: Vec<&str> = groups.iter().map(|g| g.plate.as_str()).collect();
        assert_eq!(
            plates,
            vec!["SYN0000", "SYN0001", "SYN0002", "SYN0003", "SYN0004"]
        );
        // Drain is non-idempotent.
        assert!(engine.pop_completed_groups().is_empty());
        Ok(())
    }

    #[test]
    fn windowed_tracks_span_their_frames() -> Result<()> {
        let mut engine = StubEngine::new(&EngineConfig::default()).with_group_window(3);
        engine.recognize_batch(&frames(0..8))?;

        let groups = engine.pop_completed_groups();
        // Windows 0 (frames 0-2) and 1 (frames 3-5) are complete; window 2
        // (frames 6-7) is still open.
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].frame_start, 0);
        assert_eq!(groups[0].frame_end, 2);
        assert_eq!(groups[0].frame_count, 3);
        assert_eq!(groups[1].plate, "SYN0001");
        assert_eq!(groups[1].epoch_start_ms, 1_000 + 3 * 33);
        assert_eq!(groups[1].epoch_end_ms, 1_000 + 5 * 33);

        // The open track completes once a later window shows up.
        engine.recognize_batch(&frames(9..10))?;
        let groups = engine.pop_completed_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].plate, "SYN0002");
        assert_eq!(groups[0].frame_count, 2);
        Ok(())
    }

    #[test]
    fn candidates_honor_top_n() -> Result<()> {
        let config = EngineConfig {
            top_n: 3,
            ..EngineConfig::default()
        };
        let mut engine = StubEngine::new(&config).with_group_window(1);
        let recognized = engine.recognize_batch(&frames(0..1))?;
        let plates = &recognized[0].plates;
        assert_eq!(plates.len(), 3);
        assert_eq!(plates[0].plate, "SYN0000");
        assert_eq!(plates[1].plate, "SYN0000A");
        assert!(plates[0].confidence > plates[1].confidence);
        assert!(plates[1].confidence > plates[2].confidence);
        Ok(())
    }

    #[test]
    fn identical_input_yields_identical_groups() -> Result<()> {
        let config = EngineConfig::default();
        let mut a = StubEngine::new(&config).with_group_window(2);
        let mut b = StubEngine::new(&config).with_group_window(2);
        a.recognize_batch(&frames(0..6))?;
        b.recognize_batch(&frames(0..6))?;
        assert_eq!(a.pop_completed_groups(), b.pop_completed_groups());
        Ok(())
    }

    #[test]
    fn unloaded_engine_rejects_batches() {
        let mut engine = StubEngine::unloaded(&EngineConfig::default());
        assert!(!engine.is_loaded());
        assert!(engine.recognize_batch(&frames(0..1)).is_err());
    }
}
