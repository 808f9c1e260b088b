// SPDX-License-Identifier: GPL-3.0-only

//! Paired color/depth source built on a sensor backend

use super::{
    FramePair, PixelFormat, RawFrame, SensorBackend, SensorDevice, SensorStream, StreamKind,
    StreamMode,
};
use crate::errors::{SensorError, SensorResult, StartupError};
use tracing::{debug, info, trace, warn};

/// What the source asks the sensor for
#[derive(Debug, Clone)]
pub struct SensorSettings {
    pub uri: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl SensorSettings {
    fn mode(&self, format: PixelFormat) -> StreamMode {
        StreamMode {
            width: self.width,
            height: self.height,
            fps: self.fps,
            format,
        }
    }
}

/// One device with its depth and color streams, started and verified
///
/// Resources are released in a fixed order (depth stream, color stream,
/// device, runtime) either explicitly through [`SensorSource::release`] or
/// when the source is dropped. A source that failed half way through
/// [`SensorSource::open`] releases whatever it had acquired.
pub struct SensorSource {
    backend: Box<dyn SensorBackend>,
    device: Option<Box<dyn SensorDevice>>,
    depth: Option<Box<dyn SensorStream>>,
    color: Option<Box<dyn SensorStream>>,
    max_depth: u32,
    released: bool,
}

impl SensorSource {
    /// Open the device, create and start both streams and pull the first pair
    ///
    /// Returning `Ok` guarantees that a pair has been read successfully, that
    /// both streams deliver frames at the configured size and that the depth
    /// range is non-zero.
    pub fn open(
        backend: Box<dyn SensorBackend>,
        settings: &SensorSettings,
    ) -> Result<Self, StartupError> {
        let mut source = Self {
            backend,
            device: None,
            depth: None,
            color: None,
            max_depth: 0,
            released: false,
        };

        info!(
            backend = source.backend.name(),
            uri = %settings.uri,
            "Opening depth sensor"
        );
        let device = source.device.insert(source.backend.open_device(&settings.uri)?);

        let mut depth = device.create_stream(StreamKind::Depth)?;
        apply_mode(depth.as_mut(), &settings.mode(PixelFormat::Depth1Mm));
        source.depth = Some(depth);

        if !device.has_sensor(StreamKind::Color) {
            return Err(SensorError::MissingSensor(StreamKind::Color).into());
        }
        let mut color = device.create_stream(StreamKind::Color)?;
        apply_mode(color.as_mut(), &settings.mode(PixelFormat::Rgb888));
        source.color = Some(color);

        if device.supports_depth_to_color_registration() {
            match device.enable_depth_to_color_registration() {
                Ok(()) => debug!("Depth-to-color registration enabled"),
                Err(e) => warn!(error = %e, "Depth-to-color registration unavailable"),
            }
        }

        if let Some(depth) = source.depth.as_mut() {
            depth.start()?;
        }
        if let Some(color) = source.color.as_mut() {
            color.start()?;
        }

        source.max_depth = source
            .depth
            .as_ref()
            .map(|depth| depth.max_pixel_value())
            .unwrap_or(0);
        if source.max_depth == 0 {
            return Err(StartupError::ZeroMaxDepth);
        }

        let expected = (settings.width, settings.height);
        let (color_size, depth_size) = {
            let pair = source.read_pair().map_err(StartupError::InitialRead)?;
            (pair.color.size(), pair.depth.size())
        };
        for (kind, actual) in [
            (StreamKind::Color, color_size),
            (StreamKind::Depth, depth_size),
        ] {
            if actual != expected {
                return Err(StartupError::ResolutionMismatch {
                    kind,
                    expected,
                    actual,
                });
            }
        }

        info!(
            width = settings.width,
            height = settings.height,
            fps = settings.fps,
            max_depth = source.max_depth,
            "Depth sensor streaming"
        );
        Ok(source)
    }

    /// Largest raw depth value, used to scale depth to 8 bits
    pub fn max_depth_value(&self) -> u32 {
        self.max_depth
    }

    /// Pull the next color frame, then the next depth frame
    ///
    /// Both frames borrow the streams' buffers and are invalidated by the
    /// next call.
    pub fn read_pair(&mut self) -> SensorResult<FramePair<'_>> {
        let color = self
            .color
            .as_deref_mut()
            .ok_or(SensorError::StreamInvalid(StreamKind::Color))?;
        let depth = self
            .depth
            .as_deref_mut()
            .ok_or(SensorError::StreamInvalid(StreamKind::Depth))?;

        if !color.is_valid() {
            return Err(SensorError::StreamInvalid(StreamKind::Color));
        }
        let color: RawFrame<'_> = color.read_frame()?;

        if !depth.is_valid() {
            return Err(SensorError::StreamInvalid(StreamKind::Depth));
        }
        let depth: RawFrame<'_> = depth.read_frame()?;

        trace!(
            color_frame = color.frame_index,
            depth_frame = depth.frame_index,
            "Frame pair read"
        );
        Ok(FramePair { color, depth })
    }

    /// Destroy depth stream, destroy color stream, close device, shut the runtime down
    ///
    /// Safe to call more than once; only the first call has an effect.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Some(mut depth) = self.depth.take() {
            depth.destroy();
        }
        if let Some(mut color) = self.color.take() {
            color.destroy();
        }
        if let Some(mut device) = self.device.take() {
            device.close();
        }
        self.backend.shutdown();
        info!("Depth sensor released");
    }
}

impl Drop for SensorSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// A rejected mode is not fatal: the sensor keeps its current mode and the
/// first pair's size decides whether recording can go ahead.
fn apply_mode(stream: &mut dyn SensorStream, mode: &StreamMode) {
    if let Err(e) = stream.set_mode(mode) {
        warn!(stream = %stream.kind(), mode = %mode, error = %e, "Can't apply video mode");
        eprintln!("{}", e);
    }
}
