//! Recognition engine boundary.
//!
//! `PlateEngine` is the seam the pipeline drives: batch recognition plus a
//! drain of completed plate groups. Engines are stateful (they track plate
//! groups across calls) and exclusively owned by one worker, so the trait
//! takes `&mut self` and requires `Send`, not `Sync`.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::frame::Frame;

pub mod stub;

pub use stub::StubEngine;

/// One plate read with its recognition confidence (0..100).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlateCandidate {
    pub plate: String,
    pub confidence: f32,
}

/// Per-frame output of a `recognize_batch` call.
///
/// Transient by design: the pipeline counts these and (in batch mode) writes
/// them out, but the durable unit is the completed [`GroupResult`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecognizedFrame {
    pub frame_seq: u64,
    /// Candidate plates, best first. At most the engine's `top_n`.
    pub plates: Vec<PlateCandidate>,
}

/// A completed plate group: one physical plate tracked across a run of
/// consecutive frames, finalized once the engine decides the track ended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupResult {
    pub plate: String,
    pub confidence: f32,
    pub country: String,
    pub frame_start: u64,
    pub frame_end: u64,
    pub frame_count: u64,
    pub epoch_start_ms: u64,
    pub epoch_end_ms: u64,
}

/// Groups drained after one batch call. Possibly empty: a batch that
/// completed no track still yields an (empty) drain.
pub type GroupBatch = Vec<GroupResult>;

/// Streaming plate recognition engine.
pub trait PlateEngine: Send {
    /// False when model initialization failed. The pipeline refuses to start
    /// any worker against an unloaded engine.
    fn is_loaded(&self) -> bool;

    /// Run recognition over a batch, one result per input frame, and advance
    /// any in-flight group tracking.
    fn recognize_batch(&mut self, frames: &[Frame]) -> Result<Vec<RecognizedFrame>>;

    /// Drain groups completed so far, clearing them from the engine.
    ///
    /// Non-idempotent: a second call before new input returns empty.
    fn pop_completed_groups(&mut self) -> Vec<GroupResult>;
}
