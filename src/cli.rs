// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Recording color and depth from a sensor
//! - Listing available sensors

use chrono::Local;
use clap::Args;
use depth_recorder::backends::sensor::synthetic::{STUB_PREFIX, SyntheticBackend, SyntheticOptions};
use depth_recorder::backends::sensor::{
    SensorBackend, SensorSettings, SensorSource, backend_for_uri, enumerate_sensors,
};
use depth_recorder::config::{ConfigOverrides, RecorderConfig, load_config};
use depth_recorder::constants::{
    CONTROL_POLL_INTERVAL, KEY_HELP, VIDEO_COLOR_STEM, VIDEO_DEPTH_STEM,
};
use depth_recorder::errors::StartupError;
use depth_recorder::media::encoders::{MjpegAviSink, PngWriter};
use depth_recorder::pipelines::capture::{
    CaptureContext, CaptureSession, ControlThread, HeadlessSurface, OutputMultiplexer,
    PreviewSurface, SessionOutcome, StopReason, VideoOutputs,
};
use depth_recorder::storage::RunDirectory;
use depth_recorder::terminal::TerminalPreview;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Options of the default record command
#[derive(Args, Debug, Default)]
pub struct RecordArgs {
    /// Config file (default: ./config.ini, or $DEPTH_RECORDER_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frame width
    #[arg(long)]
    width: Option<u32>,

    /// Frame height
    #[arg(long)]
    height: Option<u32>,

    /// Frame rate of both streams and the videos
    #[arg(long)]
    fps: Option<u32>,

    /// Output root; each run creates a timestamped directory inside it
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Sensor URI (kinect:<index> or stub://<name>, see 'list')
    #[arg(long)]
    device: Option<String>,

    /// Start with video recording on
    #[arg(long, conflicts_with = "no_video")]
    video: bool,

    /// Start with video recording off
    #[arg(long)]
    no_video: bool,

    /// Start with PNG sequence recording on
    #[arg(long, conflicts_with = "no_png")]
    png: bool,

    /// Start with PNG sequence recording off
    #[arg(long)]
    no_png: bool,

    /// Don't take over the terminal; stop with Ctrl+C
    #[arg(long)]
    no_preview: bool,

    /// End the run after this many frame pairs (synthetic sensors only)
    #[arg(long)]
    max_frames: Option<u64>,
}

impl RecordArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            width: self.width,
            height: self.height,
            fps: self.fps,
            directory: self.directory.clone(),
            device: self.device.clone(),
            video: flag_pair(self.video, self.no_video),
            png: flag_pair(self.png, self.no_png),
        }
    }
}

fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Record until 'q', Ctrl+C or the end of the stream; returns the exit code
pub fn record(args: &RecordArgs) -> Result<i32, StartupError> {
    let mut config = RecorderConfig::from_map(&load_config(args.config.as_deref())?)?;
    config.apply(&args.overrides())?;
    info!(?config, "Recorder configuration");

    println!("{}", KEY_HELP);

    let backend = select_backend(&config.device, args.max_frames)?;
    let source = SensorSource::open(
        backend,
        &SensorSettings {
            uri: config.device.clone(),
            width: config.width,
            height: config.height,
            fps: config.fps,
        },
    )?;

    let run_dir = RunDirectory::create(&config.directory, Local::now().naive_local())?;
    println!("Saving to {}", run_dir.path().display());

    let video = VideoOutputs {
        color: Box::new(MjpegAviSink::create(
            &run_dir.video_path(VIDEO_COLOR_STEM),
            config.width,
            config.height,
            config.fps,
        )?),
        depth: Box::new(MjpegAviSink::create(
            &run_dir.video_path(VIDEO_DEPTH_STEM),
            config.width,
            config.height,
            config.fps,
        )?),
    };
    let mut outputs = OutputMultiplexer::new(run_dir, video, Box::new(PngWriter::new()));
    outputs.set_console_output(args.no_preview);

    let context = Arc::new(CaptureContext::new(config.write_video, config.write_png));

    {
        let context = Arc::clone(&context);
        if let Err(e) = ctrlc::set_handler(move || context.toggles.request_stop()) {
            warn!(error = %e, "Failed to install Ctrl+C handler");
        }
    }

    let surface: Box<dyn PreviewSurface> = if args.no_preview {
        Box::new(HeadlessSurface)
    } else {
        Box::new(TerminalPreview::new().map_err(|e| StartupError::Preview(e.to_string()))?)
    };
    let control = ControlThread::spawn(surface, Arc::clone(&context), CONTROL_POLL_INTERVAL)
        .map_err(|e| StartupError::Preview(e.to_string()))?;

    let outcome = CaptureSession::new(source, outputs, context).run(control);
    print_summary(&outcome);
    Ok(outcome.exit_code())
}

fn select_backend(
    uri: &str,
    max_frames: Option<u64>,
) -> Result<Box<dyn SensorBackend>, StartupError> {
    match max_frames {
        // The startup read takes one frame before the loop starts
        Some(frames) if uri.starts_with(STUB_PREFIX) => {
            Ok(Box::new(SyntheticBackend::new(SyntheticOptions {
                frame_limit: Some(frames.saturating_add(1)),
                ..Default::default()
            })))
        }
        Some(_) => {
            warn!(device = uri, "--max-frames only applies to synthetic sensors");
            Ok(backend_for_uri(uri)?)
        }
        None => Ok(backend_for_uri(uri)?),
    }
}

fn print_summary(outcome: &SessionOutcome) {
    if let StopReason::Failed(e) = &outcome.reason {
        eprintln!("{}", e);
    }
    let stats = &outcome.stats;
    println!(
        "Stopped ({}) after {} frames: {} video frames, {} PNG files, {} screenshots, {} failed writes",
        outcome.reason,
        outcome.iterations,
        stats.video_color_frames,
        stats.png_files,
        stats.screenshots,
        stats.failures
    );
}

/// List all available sensors
pub fn list_devices() -> Result<i32, StartupError> {
    let sensors = enumerate_sensors();

    if sensors.is_empty() {
        println!("No sensors found.");
        return Ok(0);
    }

    println!("Available sensors:");
    println!();
    for sensor in &sensors {
        println!("  {}  ({}, {})", sensor.uri, sensor.name, sensor.backend);
    }

    Ok(0)
}
