// SPDX-License-Identifier: GPL-3.0-only

//! Output multiplexer
//!
//! Fans one normalized pair out to the sinks selected by the toggles:
//!
//! | toggle       | color                          | depth                            |
//! |--------------|--------------------------------|----------------------------------|
//! | video        | `video_color.avi`              | `video_depth.avi` (visualization)|
//! | png          | `frame_<ts>_rgb.png`           | `frame_<ts>_depth.png` (gray)    |
//! | screenshot   | `screenshot_<ts>_rgb.png`      | `screenshot_<ts>_depth.png`      |
//!
//! Every write is attempted on its own. A failed write is reported and the
//! iteration carries on; only a video frame of the wrong size stops the run.

use super::context::OutputToggles;
use crate::constants::{VIDEO_COLOR_STEM, VIDEO_DEPTH_STEM};
use crate::errors::{PipelineError, SinkError};
use crate::media::NormalizedPair;
use crate::media::encoders::{ImageRef, ImageSink, VideoSink};
use crate::storage::{PairPaths, RunDirectory};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Frames and files written over a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub video_color_frames: u64,
    pub video_depth_frames: u64,
    pub png_files: u64,
    pub screenshots: u64,
    pub failures: u64,
}

/// What one dispatch call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub video_frames: u32,
    pub png_files: u32,
    /// A screenshot request was consumed and both files were written
    pub screenshot_saved: bool,
    /// Human-readable description of every failed write
    pub failures: Vec<String>,
}

/// Video sinks for both streams, opened once for the whole run
pub struct VideoOutputs {
    pub color: Box<dyn VideoSink>,
    pub depth: Box<dyn VideoSink>,
}

pub struct OutputMultiplexer {
    run_dir: RunDirectory,
    video: VideoOutputs,
    images: Box<dyn ImageSink>,
    console: bool,
    stats: DispatchStats,
}

impl OutputMultiplexer {
    pub fn new(run_dir: RunDirectory, video: VideoOutputs, images: Box<dyn ImageSink>) -> Self {
        Self {
            run_dir,
            video,
            images,
            console: true,
            stats: DispatchStats::default(),
        }
    }

    /// Whether status and failures are also printed to stdout/stderr
    ///
    /// Turned off while a full-screen preview owns the terminal; the preview
    /// status bar shows the same messages.
    pub fn set_console_output(&mut self, enabled: bool) {
        self.console = enabled;
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Write `pair` to every enabled sink
    ///
    /// Toggles are read once, at call time. The screenshot request is
    /// consumed even if writing the screenshot fails.
    pub fn dispatch(
        &mut self,
        pair: &NormalizedPair,
        timestamp: &str,
        toggles: &OutputToggles,
    ) -> Result<DispatchReport, PipelineError> {
        let mut report = DispatchReport::default();

        if toggles.video_enabled() {
            self.write_video(pair, &mut report)?;
        }

        if toggles.png_enabled() {
            let paths = self.run_dir.frame_paths(timestamp);
            report.png_files += self.write_pair(pair, &paths, &mut report);
        }

        if toggles.take_screenshot_request() {
            let paths = self.run_dir.screenshot_paths(timestamp);
            if self.write_pair(pair, &paths, &mut report) == 2 {
                self.stats.screenshots += 1;
                report.screenshot_saved = true;
                info!(path = %paths.color.display(), "Screenshot saved");
                if self.console {
                    println!("Screenshot saved.");
                }
            }
        }

        self.stats.png_files += u64::from(report.png_files);
        Ok(report)
    }

    fn write_video(
        &mut self,
        pair: &NormalizedPair,
        report: &mut DispatchReport,
    ) -> Result<(), PipelineError> {
        let targets = [
            (VIDEO_COLOR_STEM, &mut self.video.color, &pair.color),
            (VIDEO_DEPTH_STEM, &mut self.video.depth, &pair.depth_visual),
        ];
        for (name, sink, frame) in targets {
            match sink.write(frame) {
                Ok(()) => {
                    report.video_frames += 1;
                    if name == VIDEO_COLOR_STEM {
                        self.stats.video_color_frames += 1;
                    } else {
                        self.stats.video_depth_frames += 1;
                    }
                }
                Err(e) if e.is_fatal() => {
                    error!(sink = name, iteration = pair.iteration, error = %e, "Video sink misconfigured");
                    return Err(PipelineError::Configuration(e));
                }
                Err(e) => {
                    let message = format!("Can't write {} frame: {}", name, e);
                    Self::report_failure(self.console, &mut self.stats, report, name, message);
                }
            }
        }
        Ok(())
    }

    /// Write color and gray depth to `paths`; returns how many files were written
    fn write_pair(
        &mut self,
        pair: &NormalizedPair,
        paths: &PairPaths,
        report: &mut DispatchReport,
    ) -> u32 {
        let mut written = 0;
        for (path, image) in [
            (&paths.color, ImageRef::Rgb(&pair.color)),
            (&paths.depth, ImageRef::Gray(&pair.depth_gray)),
        ] {
            match self.images.write_image(path, image) {
                Ok(()) => written += 1,
                Err(e) => {
                    let message = describe_image_failure(path, &e);
                    Self::report_failure(self.console, &mut self.stats, report, "png", message);
                }
            }
        }
        debug!(iteration = pair.iteration, written, "Image pair dispatched");
        written
    }

    fn report_failure(
        console: bool,
        stats: &mut DispatchStats,
        report: &mut DispatchReport,
        sink: &str,
        message: String,
    ) {
        warn!(sink, "{}", message);
        if console {
            eprintln!("{}", message);
        }
        stats.failures += 1;
        report.failures.push(message);
    }

    /// Finalize both videos; returns the run totals
    pub fn finish(&mut self) -> DispatchStats {
        for (name, sink) in [
            (VIDEO_COLOR_STEM, &mut self.video.color),
            (VIDEO_DEPTH_STEM, &mut self.video.depth),
        ] {
            let (width, height) = sink.size();
            match sink.finish() {
                Ok(()) => debug!(
                    sink = name,
                    frames = sink.frames_written(),
                    width,
                    height,
                    "Video finalized"
                ),
                Err(e) => {
                    error!(sink = name, error = %e, "Failed to finalize video");
                    eprintln!("Can't finalize {}: {}", name, e);
                    self.stats.failures += 1;
                }
            }
        }
        self.stats
    }
}

fn describe_image_failure(path: &Path, e: &SinkError) -> String {
    match e {
        // Io errors already carry the path
        SinkError::Io { .. } => format!("Can't write image: {}", e),
        _ => format!("Can't write image {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SinkResult;
    use chrono::NaiveDate;
    use image::{GrayImage, RgbImage};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CountingVideo {
        size: (u32, u32),
        frames: u64,
        fail: bool,
    }

    impl VideoSink for CountingVideo {
        fn size(&self) -> (u32, u32) {
            self.size
        }

        fn write(&mut self, frame: &RgbImage) -> SinkResult<()> {
            if frame.dimensions() != self.size {
                return Err(SinkError::ResolutionMismatch {
                    expected: self.size,
                    actual: frame.dimensions(),
                });
            }
            if self.fail {
                return Err(SinkError::Pipeline("encoder stalled".into()));
            }
            self.frames += 1;
            Ok(())
        }

        fn frames_written(&self) -> u64 {
            self.frames
        }

        fn finish(&mut self) -> SinkResult<()> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingImages {
        paths: Arc<Mutex<Vec<PathBuf>>>,
        fail_rgb: bool,
    }

    impl ImageSink for RecordingImages {
        fn write_image(&mut self, path: &Path, _image: ImageRef<'_>) -> SinkResult<()> {
            if self.fail_rgb && path.to_string_lossy().ends_with("_rgb.png") {
                return Err(SinkError::Encode("disk full".into()));
            }
            self.paths.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    fn pair(width: u32, height: u32) -> NormalizedPair {
        NormalizedPair {
            iteration: 1,
            color: RgbImage::new(width, height),
            depth_gray: GrayImage::new(width, height),
            depth_visual: RgbImage::new(width, height),
        }
    }

    fn multiplexer(
        root: &Path,
        color_fail: bool,
        images: RecordingImages,
    ) -> OutputMultiplexer {
        let started = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let run_dir = RunDirectory::create(root, started).unwrap();
        let video = VideoOutputs {
            color: Box::new(CountingVideo {
                size: (4, 3),
                fail: color_fail,
                ..Default::default()
            }),
            depth: Box::new(CountingVideo {
                size: (4, 3),
                ..Default::default()
            }),
        };
        let mut mux = OutputMultiplexer::new(run_dir, video, Box::new(images));
        mux.set_console_output(false);
        mux
    }

    #[test]
    fn test_nothing_enabled_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let images = RecordingImages::default();
        let mut mux = multiplexer(root.path(), false, images.clone());
        let toggles = OutputToggles::new(false, false);

        let report = mux.dispatch(&pair(4, 3), "t1", &toggles).unwrap();
        assert_eq!(report, DispatchReport::default());
        assert!(images.paths.lock().unwrap().is_empty());
    }

    #[test]
    fn test_png_and_screenshot_names() {
        let root = tempfile::tempdir().unwrap();
        let images = RecordingImages::default();
        let mut mux = multiplexer(root.path(), false, images.clone());
        let toggles = OutputToggles::new(false, true);
        toggles.request_screenshot();

        let report = mux.dispatch(&pair(4, 3), "t1", &toggles).unwrap();
        assert_eq!(report.png_files, 2);
        assert!(report.screenshot_saved);

        let names: Vec<String> = images
            .paths
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "frame_t1_rgb.png",
                "frame_t1_depth.png",
                "screenshot_t1_rgb.png",
                "screenshot_t1_depth.png"
            ]
        );

        // The request was consumed
        let report = mux.dispatch(&pair(4, 3), "t2", &toggles).unwrap();
        assert!(!report.screenshot_saved);
        assert_eq!(mux.stats().screenshots, 1);
    }

    #[test]
    fn test_failed_sink_does_not_stop_the_other() {
        let root = tempfile::tempdir().unwrap();
        let images = RecordingImages {
            fail_rgb: true,
            ..Default::default()
        };
        let mut mux = multiplexer(root.path(), true, images.clone());
        let toggles = OutputToggles::new(true, true);

        let report = mux.dispatch(&pair(4, 3), "t1", &toggles).unwrap();
        assert_eq!(report.video_frames, 1);
        assert_eq!(report.png_files, 1);
        assert_eq!(report.failures.len(), 2);

        let stats = mux.stats();
        assert_eq!(stats.video_color_frames, 0);
        assert_eq!(stats.video_depth_frames, 1);
        assert_eq!(stats.failures, 2);
    }

    #[test]
    fn test_video_resolution_mismatch_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let mut mux = multiplexer(root.path(), false, RecordingImages::default());
        let toggles = OutputToggles::new(true, false);

        let err = mux.dispatch(&pair(8, 6), "t1", &toggles).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Configuration(SinkError::ResolutionMismatch { .. })
        ));
    }
}
