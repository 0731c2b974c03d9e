//! Offline face overlay runner: replays a recorded track through the pipeline.

use anyhow::{Context, Result};
use clap::Parser;
use face_overlay::config::{Config, EXAMPLE_CONFIG};
use face_overlay::pipeline::OverlayPipeline;
use face_overlay::replay::ReplayTrack;
use face_overlay::types::VideoFrame;
use log::{error, info, warn};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Replay track (YAML list of frames and recorded detections)
    #[arg(short, long, required_unless_present = "print_config")]
    track: Option<PathBuf>,

    /// Directory for composited frames
    #[arg(short, long, default_value = "out")]
    output: PathBuf,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Print an example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Enable background replacement
    #[arg(long)]
    background: bool,

    /// Disable the face overlay layer
    #[arg(long)]
    no_overlay: bool,

    /// Disable mirroring
    #[arg(long)]
    no_mirror: bool,

    /// Display refresh rate used to tick between source frames
    #[arg(long, default_value = "60")]
    display_fps: u32,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    info!("Face Overlay replay");

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path).with_context(|| format!("Failed to load config {}", path.display()))?
        }
        None => Config::default(),
    };
    if args.background {
        config.features.background_replacement = true;
    }
    if args.no_overlay {
        config.features.face_overlay = false;
    }
    if args.no_mirror {
        config.compositor.mirror = false;
    }
    anyhow::ensure!(args.display_fps > 0, "--display-fps must be greater than 0");

    let track_path = args.track.context("--track is required")?;
    let track = ReplayTrack::from_file(&track_path)
        .with_context(|| format!("Failed to load track {}", track_path.display()))?;

    let mut pipeline = OverlayPipeline::from_config(&config)?;
    if let Err(e) = pipeline.initialize_detection(&config.detector.acceleration, |mode| Ok(track.models(mode))) {
        warn!("Continuing without AI features: {}", e);
    }

    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create output directory {}", args.output.display()))?;

    let display_interval = Duration::from_secs(1) / args.display_fps;
    let mut now = Duration::ZERO;
    let mut written = 0usize;
    let mut previous: Option<VideoFrame> = None;

    for (index, recorded) in track.frames.iter().enumerate() {
        let frame = match recorded.load() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Skipping frame {}: {}", recorded.image.display(), e);
                continue;
            }
        };

        // Display ticks between source frames repeat the previous frame
        if let Some(previous) = &previous {
            while now + display_interval < frame.timestamp {
                now += display_interval;
                pipeline.tick(now, previous)?;
            }
        }
        now = now.max(frame.timestamp);
        let report = pipeline.tick(now, &frame)?;
        if report.processed {
            if let Some(output) = pipeline.output() {
                let path = args.output.join(format!("frame_{index:05}.png"));
                output
                    .save(&path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                written += 1;
            }
        }
        previous = Some(frame);
    }

    let stats = pipeline.stats();
    info!(
        "Wrote {} frames ({} processed, {} skipped, {:.1} fps source)",
        written,
        stats.processed,
        stats.skipped,
        stats.fps()
    );
    Ok(())
}
