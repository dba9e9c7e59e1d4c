//! platestream - stream/batch harness for plate recognition engines
//!
//! Two modes:
//! 1. `stream`: run the full concurrent pipeline (ingest thread, bounded
//!    queue, N workers) against a frame source and write completed plate
//!    groups as JSON lines.
//! 2. `batch`: pre-load a directory of still images and drive the engine's
//!    batch call directly, no queue or workers involved.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use platestream::{
    load_image_frames, run_batches, EngineConfig, FrameSource, HwAccel, ImageDirSource,
    PipelineConfig, ShutdownToken, StubEngine, SyntheticSource,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the streaming pipeline against a frame source.
    Stream(StreamArgs),
    /// Run the engine over a directory of still images in fixed-size batches.
    Batch(BatchArgs),
}

#[derive(clap::Args, Debug)]
struct StreamArgs {
    /// Frame source: `stub://<name>` or a directory of images.
    #[arg(long, env = "PLATESTREAM_SOURCE", default_value = "stub://camera")]
    source: String,
    /// Frames a `stub://` source emits before ending.
    #[arg(long, default_value_t = 500)]
    frames: u64,
    /// Pace a `stub://` source at this frame rate (0 = unpaced).
    #[arg(long, default_value_t = 0)]
    fps: u32,
    /// Worker threads (clamped to available parallelism).
    #[arg(long, env = "PLATESTREAM_WORKERS", default_value_t = 2)]
    workers: usize,
    /// Frames pulled from the queue per engine call.
    #[arg(long, default_value_t = 10)]
    batch_size: usize,
    /// Bounded frame queue capacity.
    #[arg(long, default_value_t = 200)]
    queue_size: usize,
    #[command(flatten)]
    engine: EngineArgs,
    /// Output path for completed plate groups (JSON lines).
    #[arg(long, default_value = "results.jsonl")]
    output: PathBuf,
}

#[derive(clap::Args, Debug)]
struct BatchArgs {
    /// Directory of still images to recognize.
    #[arg(long)]
    images: PathBuf,
    /// Images per engine call.
    #[arg(long, default_value_t = 10)]
    batch_size: usize,
    #[command(flatten)]
    engine: EngineArgs,
    /// Output path for per-frame results (JSON lines). Omit to skip writing.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct EngineArgs {
    /// Country plate layout the engine loads.
    #[arg(long, env = "PLATESTREAM_COUNTRY", default_value = "us")]
    country: String,
    /// Run recognition on the GPU.
    #[arg(long, default_value_t = false)]
    use_gpu: bool,
    /// Candidate plates returned per frame.
    #[arg(long, default_value_t = 5)]
    top_n: usize,
    /// Frames per synthetic plate group.
    #[arg(long, default_value_t = 10)]
    group_window: u64,
}

impl EngineArgs {
    fn to_config(&self, batch_size: usize) -> EngineConfig {
        EngineConfig {
            country: self.country.clone(),
            accel: if self.use_gpu {
                HwAccel::Gpu
            } else {
                HwAccel::Cpu
            },
            batch_size,
            top_n: self.top_n,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match args.command {
        Command::Stream(stream_args) => run_stream(stream_args),
        Command::Batch(batch_args) => run_batch(batch_args),
    }
}

fn run_stream(args: StreamArgs) -> Result<()> {
    let config = PipelineConfig {
        workers: args.workers,
        batch_size: args.batch_size,
        queue_capacity: args.queue_size,
    };
    config.validate()?;
    let engine_config = args.engine.to_config(args.batch_size);
    engine_config.validate()?;

    let shutdown = ShutdownToken::new();
    let handler_token = shutdown.clone();
    ctrlc::set_handler(move || {
        log::warn!("interrupt received, draining pipeline");
        handler_token.trigger();
    })?;

    if let Some(name) = args.source.strip_prefix("stub://") {
        let mut source = SyntheticSource::new(name, args.frames);
        if args.fps > 0 {
            source = source.with_frame_interval(Duration::from_millis(1_000 / args.fps as u64));
        }
        run_stream_source(&args, &config, &engine_config, source, &shutdown)
    } else {
        let dir = PathBuf::from(&args.source);
        if !dir.is_dir() {
            return Err(anyhow!(
                "source must be a stub:// URL or an image directory, got {}",
                args.source
            ));
        }
        run_stream_source(
            &args,
            &config,
            &engine_config,
            ImageDirSource::new(dir),
            &shutdown,
        )
    }
}

fn run_stream_source<S: FrameSource>(
    args: &StreamArgs,
    config: &PipelineConfig,
    engine_config: &EngineConfig,
    source: S,
    shutdown: &ShutdownToken,
) -> Result<()> {
    let window = args.engine.group_window;
    // The synthetic engine stands in for a real recognition backend;
    // anything implementing PlateEngine slots into this factory.
    let outcome = platestream::run(
        config,
        source,
        |worker_id| {
            log::info!("loading engine for worker {}", worker_id);
            Ok(StubEngine::new(engine_config).with_group_window(window))
        },
        shutdown,
    )?;

    log::info!("stream run: {}", outcome.report);
    let written = platestream::write_group_batches(&args.output, &outcome.group_batches)?;
    log::info!("{} plate groups written to {}", written, args.output.display());
    Ok(())
}

fn run_batch(args: BatchArgs) -> Result<()> {
    let engine_config = args.engine.to_config(args.batch_size);
    engine_config.validate()?;

    let frames = load_image_frames(&args.images)?;
    log::info!("loaded {} images from {}", frames.len(), args.images.display());

    let mut engine = StubEngine::new(&engine_config).with_group_window(args.engine.group_window);
    let (recognized, report) = run_batches(&mut engine, &frames, args.batch_size)?;

    log::info!("batch run: {}", report);
    if let Some(path) = &args.output {
        let written = platestream::write_recognized_frames(path, &recognized)?;
        log::info!("{} frame results written to {}", written, path.display());
    }
    Ok(())
}
