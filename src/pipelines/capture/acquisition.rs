// SPDX-License-Identifier: GPL-3.0-only

//! Acquisition loop
//!
//! ```text
//!            ┌──────────────────────────── running ─┐
//!            ▼                                      │
//! RUNNING: pull pair → normalize → publish → dispatch → check
//!            │ read error / end of stream           │ stop requested
//!            ▼                                      ▼
//!         STOPPED ◀─────────────────────────────────┘
//! ```
//!
//! There is no retry: the first failed pull ends the run. The failure is
//! returned in [`StopReason::Failed`] and reported by the caller once the
//! terminal is back in its normal state.

use super::context::CaptureContext;
use super::multiplexer::OutputMultiplexer;
use super::timestamp::TimestampClock;
use crate::backends::sensor::SensorSource;
use crate::errors::{PipelineError, SensorError};
use crate::media::normalize_pair;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Why the loop entered STOPPED
#[derive(Debug)]
pub enum StopReason {
    /// `q`, Ctrl+C or anything else that cleared the run flag
    UserRequested,
    /// The source ran out of frames
    EndOfStream,
    /// A pull, conversion or video configuration failure
    Failed(PipelineError),
}

impl StopReason {
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::Failed(_))
    }

    /// Process exit code for a run that ended this way
    pub fn exit_code(&self) -> i32 {
        if self.is_failure() { 1 } else { 0 }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::UserRequested => write!(f, "stopped by user"),
            StopReason::EndOfStream => write!(f, "end of stream"),
            StopReason::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// The producer side of a run
pub struct AcquisitionLoop<'a> {
    source: &'a mut SensorSource,
    outputs: &'a mut OutputMultiplexer,
    context: &'a CaptureContext,
    clock: TimestampClock,
    iteration: u64,
}

impl<'a> AcquisitionLoop<'a> {
    pub fn new(
        source: &'a mut SensorSource,
        outputs: &'a mut OutputMultiplexer,
        context: &'a CaptureContext,
    ) -> Self {
        Self {
            source,
            outputs,
            context,
            clock: TimestampClock::new(),
            iteration: 0,
        }
    }

    /// Iterations completed so far
    pub fn iterations(&self) -> u64 {
        self.iteration
    }

    /// Run one RUNNING iteration; `Some` means the loop is now STOPPED
    pub fn step(&mut self) -> Option<StopReason> {
        let iteration = self.iteration + 1;
        let max_depth = self.source.max_depth_value();

        let normalized = match self.source.read_pair() {
            Ok(raw) => normalize_pair(&raw, max_depth, iteration)
                .map_err(|e| PipelineError::Normalize(e.to_string())),
            Err(SensorError::EndOfStream) => {
                info!(iteration, "Sensor reached end of stream");
                return Some(StopReason::EndOfStream);
            }
            Err(e) => {
                error!(iteration, stream = ?e.stream(), error = %e, "Frame pull failed");
                return Some(StopReason::Failed(PipelineError::Sensor(e)));
            }
        };
        let pair = match normalized {
            Ok(pair) => Arc::new(pair),
            Err(e) => {
                error!(iteration, error = %e, "Frame conversion failed");
                return Some(StopReason::Failed(e));
            }
        };

        let timestamp = self.clock.next();
        if !self.context.frames.publish(Arc::clone(&pair)) {
            debug!(iteration, "Preview busy, pair not published");
        }

        match self
            .outputs
            .dispatch(&pair, &timestamp, &self.context.toggles)
        {
            Ok(report) => {
                for _ in &report.failures {
                    self.context.status.record_sink_failure();
                }
                if let Some(last) = report.failures.last() {
                    self.context.status.set_message(last.clone());
                } else if report.screenshot_saved {
                    self.context.status.set_message("Screenshot saved.");
                }
            }
            Err(e) => {
                error!(iteration, error = %e, "Dispatch failed");
                return Some(StopReason::Failed(e));
            }
        }

        self.iteration = iteration;
        self.context.status.record_iteration(iteration);
        debug!(iteration, %timestamp, "Iteration complete");

        if self.context.toggles.is_running() {
            None
        } else {
            Some(StopReason::UserRequested)
        }
    }

    /// Iterate until STOPPED
    ///
    /// The run flag is cleared on the way out so the control thread winds
    /// down whatever ended the loop.
    pub fn run(mut self) -> (StopReason, u64) {
        info!("Acquisition loop running");
        let reason = loop {
            if let Some(reason) = self.step() {
                break reason;
            }
        };
        self.context.toggles.request_stop();
        info!(iterations = self.iteration, reason = %reason, "Acquisition loop stopped");
        (reason, self.iteration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::sensor::SensorSettings;
    use crate::backends::sensor::synthetic::{SyntheticBackend, SyntheticOptions};
    use crate::media::encoders::{ImageRef, ImageSink, VideoSink};
    use crate::pipelines::capture::multiplexer::VideoOutputs;
    use crate::errors::SinkResult;
    use crate::storage::RunDirectory;
    use chrono::NaiveDate;
    use image::RgbImage;
    use std::path::Path;

    struct NullVideo;

    impl VideoSink for NullVideo {
        fn size(&self) -> (u32, u32) {
            (32, 24)
        }
        fn write(&mut self, _frame: &RgbImage) -> SinkResult<()> {
            Ok(())
        }
        fn frames_written(&self) -> u64 {
            0
        }
        fn finish(&mut self) -> SinkResult<()> {
            Ok(())
        }
    }

    struct NullImages;

    impl ImageSink for NullImages {
        fn write_image(&mut self, _path: &Path, _image: ImageRef<'_>) -> SinkResult<()> {
            Ok(())
        }
    }

    fn setup(options: SyntheticOptions, root: &Path) -> (SensorSource, OutputMultiplexer) {
        let settings = SensorSettings {
            uri: "stub://loop".to_string(),
            width: 32,
            height: 24,
            fps: 25,
        };
        let source = SensorSource::open(Box::new(SyntheticBackend::new(options)), &settings)
            .expect("synthetic sensor opens");
        let started = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let run_dir = RunDirectory::create(root, started).unwrap();
        let video = VideoOutputs {
            color: Box::new(NullVideo),
            depth: Box::new(NullVideo),
        };
        let mut outputs = OutputMultiplexer::new(run_dir, video, Box::new(NullImages));
        outputs.set_console_output(false);
        (source, outputs)
    }

    #[test]
    fn test_end_of_stream_stops_cleanly() {
        let root = tempfile::tempdir().unwrap();
        // One frame goes to the startup read
        let (mut source, mut outputs) = setup(
            SyntheticOptions {
                frame_limit: Some(6),
                ..Default::default()
            },
            root.path(),
        );
        let context = CaptureContext::new(false, false);

        let (reason, iterations) = AcquisitionLoop::new(&mut source, &mut outputs, &context).run();
        assert!(matches!(reason, StopReason::EndOfStream));
        assert_eq!(reason.exit_code(), 0);
        assert_eq!(iterations, 5);
        assert!(!context.toggles.is_running());
        assert_eq!(context.frames.latest().unwrap().iteration, 5);
    }

    #[test]
    fn test_read_failure_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let (mut source, mut outputs) = setup(
            SyntheticOptions {
                fail_color_at: Some(4),
                ..Default::default()
            },
            root.path(),
        );
        let context = CaptureContext::new(false, false);

        let (reason, iterations) = AcquisitionLoop::new(&mut source, &mut outputs, &context).run();
        assert!(matches!(reason, StopReason::Failed(PipelineError::Sensor(_))));
        assert_eq!(reason.exit_code(), 1);
        assert_eq!(iterations, 2);
    }

    #[test]
    fn test_cleared_run_flag_stops_after_current_iteration() {
        let root = tempfile::tempdir().unwrap();
        let (mut source, mut outputs) = setup(SyntheticOptions::default(), root.path());
        let context = CaptureContext::new(false, false);
        context.toggles.request_stop();

        let mut acquisition = AcquisitionLoop::new(&mut source, &mut outputs, &context);
        assert!(matches!(acquisition.step(), Some(StopReason::UserRequested)));
        assert_eq!(acquisition.iterations(), 1);
    }
}
