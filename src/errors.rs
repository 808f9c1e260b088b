// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the recorder
//!
//! Errors are split by how far they are allowed to travel:
//!
//! - [`SensorError`]: device and stream failures. Always fatal.
//! - [`SinkError`]: a single video or PNG write. Logged and dropped by the
//!   output multiplexer, except a video resolution mismatch.
//! - [`StartupError`]: anything that prevents the acquisition loop from starting.
//! - [`PipelineError`]: what stops a running acquisition loop.

use std::fmt;
use std::path::PathBuf;

use crate::backends::sensor::StreamKind;

/// Result type alias for sensor operations
pub type SensorResult<T> = Result<T, SensorError>;

/// Result type alias for sink writes
pub type SinkResult<T> = Result<T, SinkError>;

/// Sensor runtime, device and stream errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// The sensor runtime could not be initialized
    RuntimeInit(String),
    /// No device could be opened at the requested URI
    DeviceOpen(String),
    /// The device does not carry the requested sensor
    MissingSensor(StreamKind),
    /// Stream creation failed on an open device
    StreamCreate { kind: StreamKind, message: String },
    /// Mode negotiation failed (resolution, fps or pixel format)
    SetMode { kind: StreamKind, message: String },
    /// Starting the stream failed
    StreamStart { kind: StreamKind, message: String },
    /// The stream became invalid while running
    StreamInvalid(StreamKind),
    /// Reading a frame failed
    ReadFailed { kind: StreamKind, message: String },
    /// The source has no more frames (file playback, bounded synthetic runs)
    EndOfStream,
}

impl SensorError {
    /// The stream that failed, if the error is stream-specific
    pub fn stream(&self) -> Option<StreamKind> {
        match self {
            SensorError::MissingSensor(kind) | SensorError::StreamInvalid(kind) => Some(*kind),
            SensorError::StreamCreate { kind, .. }
            | SensorError::SetMode { kind, .. }
            | SensorError::StreamStart { kind, .. }
            | SensorError::ReadFailed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::RuntimeInit(msg) => write!(f, "Sensor runtime initialization failed: {}", msg),
            SensorError::DeviceOpen(msg) => write!(f, "Can't open device: {}", msg),
            SensorError::MissingSensor(kind) => write!(f, "Device has no {} sensor", kind),
            SensorError::StreamCreate { kind, message } => {
                write!(f, "Can't create {} stream on device: {}", kind, message)
            }
            SensorError::SetMode { kind, message } => {
                write!(f, "Can't apply video mode to {} stream: {}", kind, message)
            }
            SensorError::StreamStart { kind, message } => {
                write!(f, "Can't start {} stream: {}", kind, message)
            }
            SensorError::StreamInvalid(kind) => write!(f, "{} stream not valid", kind),
            SensorError::ReadFailed { kind, message } => {
                write!(f, "Can't read {} frame: {}", kind, message)
            }
            SensorError::EndOfStream => write!(f, "End of stream"),
        }
    }
}

impl std::error::Error for SensorError {}

/// Errors from a single sink write
#[derive(Debug)]
pub enum SinkError {
    /// Filesystem error while writing an image
    Io { path: PathBuf, source: std::io::Error },
    /// The encoder rejected the frame
    Encode(String),
    /// Frame size differs from the size the sink was opened with
    ResolutionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// GStreamer pipeline failure
    Pipeline(String),
}

impl SinkError {
    /// Whether this error must stop the pipeline instead of being skipped
    pub fn is_fatal(&self) -> bool {
        matches!(self, SinkError::ResolutionMismatch { .. })
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            SinkError::Encode(msg) => write!(f, "Encoding failed: {}", msg),
            SinkError::ResolutionMismatch { expected, actual } => write!(
                f,
                "Frame size {}x{} doesn't match sink {}x{}",
                actual.0, actual.1, expected.0, expected.1
            ),
            SinkError::Pipeline(msg) => write!(f, "Pipeline error: {}", msg),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<image::ImageError> for SinkError {
    fn from(err: image::ImageError) -> Self {
        SinkError::Encode(err.to_string())
    }
}

/// Errors that prevent the acquisition loop from being entered
#[derive(Debug)]
pub enum StartupError {
    /// Configuration could not be read or a value is malformed
    Config(String),
    /// The run directory could not be created
    Storage { path: PathBuf, source: std::io::Error },
    /// A sensor stage failed
    Sensor(SensorError),
    /// The depth stream reports a maximum pixel value of zero
    ZeroMaxDepth,
    /// The first frame pair could not be read
    InitialRead(SensorError),
    /// The sensor delivers frames at a size other than the configured one
    ResolutionMismatch {
        kind: StreamKind,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// A sink could not be opened
    Sink(SinkError),
    /// The preview surface could not be set up
    Preview(String),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::Config(msg) => write!(f, "Configuration error: {}", msg),
            StartupError::Storage { path, source } => {
                write!(f, "Could not create folder {}: {}", path.display(), source)
            }
            StartupError::Sensor(e) => write!(f, "{}", e),
            StartupError::ZeroMaxDepth => {
                write!(f, "Depth stream reports a maximum pixel value of 0")
            }
            StartupError::InitialRead(e) => write!(f, "Initial frame read failed: {}", e),
            StartupError::ResolutionMismatch {
                kind,
                expected,
                actual,
            } => write!(
                f,
                "{} stream delivers {}x{} frames, configured {}x{}",
                kind, actual.0, actual.1, expected.0, expected.1
            ),
            StartupError::Sink(e) => write!(f, "Can't open output: {}", e),
            StartupError::Preview(msg) => write!(f, "Preview error: {}", msg),
        }
    }
}

impl std::error::Error for StartupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StartupError::Storage { source, .. } => Some(source),
            StartupError::Sensor(e) | StartupError::InitialRead(e) => Some(e),
            StartupError::Sink(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SensorError> for StartupError {
    fn from(err: SensorError) -> Self {
        StartupError::Sensor(err)
    }
}

impl From<SinkError> for StartupError {
    fn from(err: SinkError) -> Self {
        StartupError::Sink(err)
    }
}

/// Errors that move the acquisition loop to its stopped state with a failure
#[derive(Debug)]
pub enum PipelineError {
    /// A frame pair could not be pulled
    Sensor(SensorError),
    /// The normalizer rejected a frame
    Normalize(String),
    /// A video sink received a frame of the wrong size
    Configuration(SinkError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Sensor(e) => write!(f, "{}", e),
            PipelineError::Normalize(msg) => write!(f, "Frame conversion failed: {}", msg),
            PipelineError::Configuration(e) => write!(f, "Video configuration error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Sensor(e) => Some(e),
            PipelineError::Configuration(e) => Some(e),
            PipelineError::Normalize(_) => None,
        }
    }
}

impl From<SensorError> for PipelineError {
    fn from(err: SensorError) -> Self {
        PipelineError::Sensor(err)
    }
}
