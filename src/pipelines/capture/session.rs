// SPDX-License-Identifier: GPL-3.0-only

//! One recording run from the first loop iteration to released hardware

use super::acquisition::{AcquisitionLoop, StopReason};
use super::context::CaptureContext;
use super::control::ControlThread;
use super::multiplexer::{DispatchStats, OutputMultiplexer};
use crate::backends::sensor::SensorSource;
use std::sync::Arc;
use tracing::info;

/// How a run ended and what it produced
#[derive(Debug)]
pub struct SessionOutcome {
    pub reason: StopReason,
    pub iterations: u64,
    pub stats: DispatchStats,
}

impl SessionOutcome {
    pub fn exit_code(&self) -> i32 {
        self.reason.exit_code()
    }
}

/// A started source with its outputs and shared context
pub struct CaptureSession {
    source: SensorSource,
    outputs: OutputMultiplexer,
    context: Arc<CaptureContext>,
}

impl CaptureSession {
    pub fn new(
        source: SensorSource,
        outputs: OutputMultiplexer,
        context: Arc<CaptureContext>,
    ) -> Self {
        Self {
            source,
            outputs,
            context,
        }
    }

    /// Run the acquisition loop to completion, then tear down
    ///
    /// Teardown order: join the control thread, finalize the videos, release
    /// the sensor (depth stream, color stream, device, runtime).
    pub fn run(mut self, control: ControlThread) -> SessionOutcome {
        let (reason, iterations) =
            AcquisitionLoop::new(&mut self.source, &mut self.outputs, &self.context).run();

        control.join();
        let stats = self.outputs.finish();
        self.source.release();

        info!(
            iterations,
            video_color_frames = stats.video_color_frames,
            video_depth_frames = stats.video_depth_frames,
            png_files = stats.png_files,
            screenshots = stats.screenshots,
            failures = stats.failures,
            "Recording finished"
        );
        SessionOutcome {
            reason,
            iterations,
            stats,
        }
    }
}
