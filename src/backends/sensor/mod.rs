// SPDX-License-Identifier: GPL-3.0-only

//! Depth sensor abstraction
//!
//! A sensor is reached through three layers, mirroring how depth camera
//! runtimes expose them:
//!
//! ```text
//! SensorBackend (runtime)  ── open_device(uri) ──▶  SensorDevice
//!                                                      │
//!                                     create_stream(Color | Depth)
//!                                                      ▼
//!                                                 SensorStream
//!                                      set_mode · start · read_frame · destroy
//! ```
//!
//! [`SensorSource`] composes one device with its depth and color streams,
//! pulls synchronized pairs and releases everything in a fixed order.
//!
//! Backends:
//! - [`synthetic`]: generated frames for `stub://` URIs (tests, demos)
//! - `freedepth`: Kinect sensors over native USB (feature `freedepth`, x86_64)

#[cfg(all(target_arch = "x86_64", feature = "freedepth"))]
pub mod freedepth;
mod source;
pub mod synthetic;

pub use source::{SensorSettings, SensorSource};

use crate::errors::SensorResult;
use std::fmt;

/// The two sensors a pair is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Color,
    Depth,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Color => write!(f, "Color"),
            StreamKind::Depth => write!(f, "Depth"),
        }
    }
}

/// Pixel formats a stream can be negotiated to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 8-bit R, G, B
    Rgb888,
    /// Packed 8-bit B, G, R
    Bgr888,
    /// 16-bit unsigned depth in millimeters
    Depth1Mm,
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Rgb888 => write!(f, "RGB888"),
            PixelFormat::Bgr888 => write!(f, "BGR888"),
            PixelFormat::Depth1Mm => write!(f, "DEPTH_1_MM"),
        }
    }
}

/// Requested stream configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamMode {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}@{}fps {}",
            self.width, self.height, self.fps, self.format
        )
    }
}

/// Pixel storage of a raw frame, borrowed from the stream that produced it
#[derive(Debug, Clone, Copy)]
pub enum RawPixels<'a> {
    /// Packed color, 3 bytes per pixel
    Color8 {
        data: &'a [u8],
        format: PixelFormat,
    },
    /// One u16 millimeter value per pixel
    DepthMm(&'a [u16]),
}

/// A frame as delivered by a stream
///
/// The buffer belongs to the stream and is only valid until the next
/// `read_frame` call on it; anything that must outlive the iteration has to
/// be copied out (see [`crate::media::normalize`]).
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    pub pixels: RawPixels<'a>,
    pub width: u32,
    pub height: u32,
    /// Row pitch in elements (bytes for color, u16 values for depth)
    pub stride: usize,
    /// Sensor frame counter, if the backend provides one
    pub frame_index: u64,
}

impl RawFrame<'_> {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// A synchronized color/depth pair from one `read_pair` call
#[derive(Debug, Clone, Copy)]
pub struct FramePair<'a> {
    pub color: RawFrame<'a>,
    pub depth: RawFrame<'a>,
}

/// Information about an attached sensor, for listing
#[derive(Debug, Clone)]
pub struct SensorInfo {
    pub name: String,
    pub uri: String,
    pub backend: &'static str,
}

/// The sensor runtime
pub trait SensorBackend {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Sensors this runtime can currently open
    fn enumerate(&self) -> Vec<SensorInfo>;

    /// Open the device at `uri`
    fn open_device(&mut self, uri: &str) -> SensorResult<Box<dyn SensorDevice>>;

    /// Global runtime shutdown, called once after every device is closed
    fn shutdown(&mut self);
}

/// An opened sensor device
pub trait SensorDevice {
    fn has_sensor(&self, kind: StreamKind) -> bool;

    fn create_stream(&mut self, kind: StreamKind) -> SensorResult<Box<dyn SensorStream>>;

    /// Whether depth pixels can be re-projected onto the color image
    fn supports_depth_to_color_registration(&self) -> bool {
        false
    }

    fn enable_depth_to_color_registration(&mut self) -> SensorResult<()> {
        Ok(())
    }

    fn close(&mut self);
}

/// One stream of an opened device
pub trait SensorStream {
    fn kind(&self) -> StreamKind;

    fn set_mode(&mut self, mode: &StreamMode) -> SensorResult<()>;

    fn start(&mut self) -> SensorResult<()>;

    /// False once the stream has been invalidated (device unplugged, stopped)
    fn is_valid(&self) -> bool;

    /// Block until the next frame is available
    fn read_frame(&mut self) -> SensorResult<RawFrame<'_>>;

    /// Largest value a pixel can take (depth range in mm for depth streams)
    fn max_pixel_value(&self) -> u32;

    fn destroy(&mut self);
}

/// Pick the backend responsible for a device URI
pub fn backend_for_uri(uri: &str) -> SensorResult<Box<dyn SensorBackend>> {
    if uri.starts_with(synthetic::STUB_PREFIX) {
        return Ok(Box::new(synthetic::SyntheticBackend::default()));
    }

    #[cfg(all(target_arch = "x86_64", feature = "freedepth"))]
    if uri.starts_with(freedepth::KINECT_PREFIX) {
        return Ok(Box::new(freedepth::FreedepthBackend::new()));
    }

    Err(crate::errors::SensorError::DeviceOpen(format!(
        "no backend available for device '{}'",
        uri
    )))
}

/// Every sensor reachable through the compiled-in backends
pub fn enumerate_sensors() -> Vec<SensorInfo> {
    let mut sensors = synthetic::SyntheticBackend::default().enumerate();

    #[cfg(all(target_arch = "x86_64", feature = "freedepth"))]
    sensors.extend(freedepth::FreedepthBackend::new().enumerate());

    sensors
}
