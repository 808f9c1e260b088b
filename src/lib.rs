// SPDX-License-Identifier: GPL-3.0-only

//! Depth Recorder - synchronized color and depth capture from depth cameras
//!
//! This library provides the core functionality for the `depth-recorder`
//! binary: sensor access, frame normalization, video and PNG output, and the
//! capture pipeline that ties them together.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Depth sensor abstraction (Kinect via freedepth, synthetic)
//! - [`media`]: Frame normalization and output encoders
//! - [`pipelines`]: Acquisition loop, output multiplexer and control thread
//! - [`config`]: Recorder configuration
//! - [`storage`]: Run directory and output file naming
//! - [`terminal`]: Terminal preview surface
//!
//! # Example
//!
//! ```ignore
//! // Record with the settings from ./config.ini:
//! // depth-recorder
//! // Record from the synthetic sensor for 100 frames without preview:
//! // depth-recorder --device stub://demo --png --no-preview --max-frames 100
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use config::RecorderConfig;
pub use errors::{PipelineError, SensorError, SinkError, StartupError};
pub use pipelines::capture::{CaptureContext, CaptureSession, SessionOutcome, StopReason};
