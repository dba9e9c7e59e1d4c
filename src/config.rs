//! Pipeline and engine configuration.
//!
//! Defaults mirror the harness's canonical settings: two workers, batches of
//! ten frames, a queue of two hundred. `PipelineConfig::effective_workers`
//! clamps the configured worker count to the hardware parallelism actually
//! available, so oversubscribed configs degrade instead of failing.

use anyhow::{anyhow, Result};

pub const DEFAULT_WORKERS: usize = 2;
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_QUEUE_CAPACITY: usize = 200;
pub const DEFAULT_COUNTRY: &str = "us";
pub const DEFAULT_TOP_N: usize = 5;

/// Where the engine runs recognition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HwAccel {
    #[default]
    Cpu,
    Gpu,
}

/// Settings for the streaming pipeline itself.
#[derive(Clone, Copy, Debug)]
pub struct PipelineConfig {
    /// Requested worker threads. Clamped to hardware parallelism at run time.
    pub workers: usize,
    /// Maximum frames pulled from the queue per engine call.
    pub batch_size: usize,
    /// Bounded frame queue capacity. The producer blocks when this is reached.
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(anyhow!("workers must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(anyhow!("batch_size must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(anyhow!("queue_capacity must be at least 1"));
        }
        Ok(())
    }

    /// Worker count actually used: `min(workers, available parallelism)`.
    pub fn effective_workers(&self) -> usize {
        let hardware = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.workers.min(hardware).max(1)
    }
}

/// Settings handed to each engine instance at construction.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Country plate layout the engine loads (e.g. "us", "eu").
    pub country: String,
    pub accel: HwAccel,
    /// Frames the engine should expect per `recognize_batch` call.
    pub batch_size: usize,
    /// Candidate plates returned per frame.
    pub top_n: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            country: DEFAULT_COUNTRY.to_string(),
            accel: HwAccel::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.country.trim().is_empty() {
            return Err(anyhow!("country must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(anyhow!("batch_size must be at least 1"));
        }
        if self.top_n == 0 {
            return Err(anyhow!("top_n must be at least 1"));
        }
        Ok(())
    }
}
