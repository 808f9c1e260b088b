// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic depth sensor for `stub://` device URIs
//!
//! Produces a moving color gradient and a depth ramp so the whole recording
//! pipeline can run without hardware. Failure injection and frame limits make
//! it usable for exercising the loop's stop paths.

use super::{
    PixelFormat, RawFrame, RawPixels, SensorBackend, SensorDevice, SensorInfo, SensorStream,
    StreamKind, StreamMode,
};
use crate::constants::{DEFAULT_HEIGHT, DEFAULT_WIDTH, SYNTHETIC_MAX_DEPTH_MM};
use crate::errors::{SensorError, SensorResult};
use tracing::{debug, info};

/// URI prefix selecting the synthetic backend
pub const STUB_PREFIX: &str = "stub://";

/// Behaviour knobs for the synthetic sensor
#[derive(Debug, Clone)]
pub struct SyntheticOptions {
    /// Depth range reported by `max_pixel_value`
    pub max_depth: u32,
    /// Channel order of the generated color frames
    pub color_format: PixelFormat,
    /// Whether the device exposes a color sensor
    pub has_color: bool,
    /// Number of frames each stream delivers before reporting end of stream
    pub frame_limit: Option<u64>,
    /// 1-based read at which the color stream fails
    pub fail_color_at: Option<u64>,
    /// 1-based read at which the depth stream fails
    pub fail_depth_at: Option<u64>,
}

impl Default for SyntheticOptions {
    fn default() -> Self {
        Self {
            max_depth: SYNTHETIC_MAX_DEPTH_MM,
            color_format: PixelFormat::Rgb888,
            has_color: true,
            frame_limit: None,
            fail_color_at: None,
            fail_depth_at: None,
        }
    }
}

/// Runtime handing out synthetic devices
#[derive(Debug, Default)]
pub struct SyntheticBackend {
    options: SyntheticOptions,
}

impl SyntheticBackend {
    pub fn new(options: SyntheticOptions) -> Self {
        Self { options }
    }
}

impl SensorBackend for SyntheticBackend {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn enumerate(&self) -> Vec<SensorInfo> {
        vec![SensorInfo {
            name: "Synthetic depth sensor".to_string(),
            uri: format!("{}test", STUB_PREFIX),
            backend: self.name(),
        }]
    }

    fn open_device(&mut self, uri: &str) -> SensorResult<Box<dyn SensorDevice>> {
        let name = uri
            .strip_prefix(STUB_PREFIX)
            .ok_or_else(|| SensorError::DeviceOpen(format!("not a synthetic device: {}", uri)))?;
        info!(device = name, "Opened synthetic depth sensor");
        Ok(Box::new(SyntheticDevice {
            options: self.options.clone(),
        }))
    }

    fn shutdown(&mut self) {
        debug!("Synthetic runtime shut down");
    }
}

struct SyntheticDevice {
    options: SyntheticOptions,
}

impl SensorDevice for SyntheticDevice {
    fn has_sensor(&self, kind: StreamKind) -> bool {
        match kind {
            StreamKind::Color => self.options.has_color,
            StreamKind::Depth => true,
        }
    }

    fn create_stream(&mut self, kind: StreamKind) -> SensorResult<Box<dyn SensorStream>> {
        if !self.has_sensor(kind) {
            return Err(SensorError::StreamCreate {
                kind,
                message: "sensor not present".to_string(),
            });
        }
        let fail_at = match kind {
            StreamKind::Color => self.options.fail_color_at,
            StreamKind::Depth => self.options.fail_depth_at,
        };
        let format = match kind {
            StreamKind::Color => self.options.color_format,
            StreamKind::Depth => PixelFormat::Depth1Mm,
        };
        Ok(Box::new(SyntheticStream {
            kind,
            mode: StreamMode {
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
                fps: 30,
                format,
            },
            max_depth: self.options.max_depth,
            frame_limit: self.options.frame_limit,
            fail_at,
            started: false,
            valid: true,
            frames: 0,
            color: Vec::new(),
            depth: Vec::new(),
        }))
    }

    fn supports_depth_to_color_registration(&self) -> bool {
        true
    }

    fn close(&mut self) {
        debug!("Synthetic device closed");
    }
}

struct SyntheticStream {
    kind: StreamKind,
    mode: StreamMode,
    max_depth: u32,
    frame_limit: Option<u64>,
    fail_at: Option<u64>,
    started: bool,
    valid: bool,
    frames: u64,
    color: Vec<u8>,
    depth: Vec<u16>,
}

impl SyntheticStream {
    fn fill_color(&mut self) {
        let (w, h) = (self.mode.width as usize, self.mode.height as usize);
        let shift = self.frames as usize;
        self.color.resize(w * h * 3, 0);
        for (i, px) in self.color.chunks_exact_mut(3).enumerate() {
            let (x, y) = (i % w, i / w);
            let r = ((x + shift) * 255 / w.max(1)) as u8;
            let g = (y * 255 / h.max(1)) as u8;
            let b = (shift % 256) as u8;
            match self.mode.format {
                PixelFormat::Bgr888 => px.copy_from_slice(&[b, g, r]),
                _ => px.copy_from_slice(&[r, g, b]),
            }
        }
    }

    fn fill_depth(&mut self) {
        let (w, h) = (self.mode.width as usize, self.mode.height as usize);
        let span = self.max_depth as usize + 1;
        let shift = self.frames as usize;
        self.depth.resize(w * h, 0);
        for (i, d) in self.depth.iter_mut().enumerate() {
            let (x, y) = (i % w, i / w);
            *d = ((x + y + shift) * span / (w + h).max(1) % span) as u16;
        }
    }
}

impl SensorStream for SyntheticStream {
    fn kind(&self) -> StreamKind {
        self.kind
    }

    fn set_mode(&mut self, mode: &StreamMode) -> SensorResult<()> {
        let expected = match self.kind {
            StreamKind::Color => matches!(mode.format, PixelFormat::Rgb888 | PixelFormat::Bgr888),
            StreamKind::Depth => mode.format == PixelFormat::Depth1Mm,
        };
        if !expected {
            return Err(SensorError::SetMode {
                kind: self.kind,
                message: format!("format {} not supported", mode.format),
            });
        }
        // Keep the generated channel order; only geometry and rate follow the request
        self.mode = StreamMode {
            format: self.mode.format,
            ..*mode
        };
        Ok(())
    }

    fn start(&mut self) -> SensorResult<()> {
        self.started = true;
        Ok(())
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn read_frame(&mut self) -> SensorResult<RawFrame<'_>> {
        if !self.started {
            return Err(SensorError::ReadFailed {
                kind: self.kind,
                message: "stream not started".to_string(),
            });
        }
        if self.frame_limit.is_some_and(|limit| self.frames >= limit) {
            return Err(SensorError::EndOfStream);
        }
        self.frames += 1;
        if self.fail_at == Some(self.frames) {
            self.valid = false;
            return Err(SensorError::ReadFailed {
                kind: self.kind,
                message: "injected failure".to_string(),
            });
        }

        let width = self.mode.width;
        let height = self.mode.height;
        let pixels = match self.kind {
            StreamKind::Color => {
                self.fill_color();
                RawPixels::Color8 {
                    data: &self.color,
                    format: self.mode.format,
                }
            }
            StreamKind::Depth => {
                self.fill_depth();
                RawPixels::DepthMm(&self.depth)
            }
        };
        let channels = match self.kind {
            StreamKind::Color => 3,
            StreamKind::Depth => 1,
        };

        Ok(RawFrame {
            pixels,
            width,
            height,
            stride: width as usize * channels,
            frame_index: self.frames,
        })
    }

    fn max_pixel_value(&self) -> u32 {
        match self.kind {
            StreamKind::Color => 255,
            StreamKind::Depth => self.max_depth,
        }
    }

    fn destroy(&mut self) {
        self.started = false;
        self.valid = false;
        self.color = Vec::new();
        self.depth = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_stream(options: SyntheticOptions, kind: StreamKind) -> Box<dyn SensorStream> {
        let mut backend = SyntheticBackend::new(options);
        let mut device = backend.open_device("stub://unit").unwrap();
        let mut stream = device.create_stream(kind).unwrap();
        stream.start().unwrap();
        stream
    }

    #[test]
    fn test_rejects_foreign_uri() {
        let mut backend = SyntheticBackend::default();
        assert!(backend.open_device("kinect:0").is_err());
    }

    #[test]
    fn test_depth_stays_within_range() {
        let options = SyntheticOptions {
            max_depth: 1000,
            ..Default::default()
        };
        let mut stream = open_stream(options, StreamKind::Depth);
        let frame = stream.read_frame().unwrap();
        let RawPixels::DepthMm(values) = frame.pixels else {
            panic!("depth stream must deliver millimeters");
        };
        assert!(values.iter().all(|&d| d <= 1000));
    }

    #[test]
    fn test_frame_index_counts_reads() {
        let mut stream = open_stream(SyntheticOptions::default(), StreamKind::Depth);
        assert_eq!(stream.read_frame().unwrap().frame_index, 1);
        assert_eq!(stream.read_frame().unwrap().frame_index, 2);
    }

    #[test]
    fn test_frame_limit_ends_stream() {
        let options = SyntheticOptions {
            frame_limit: Some(2),
            ..Default::default()
        };
        let mut stream = open_stream(options, StreamKind::Color);
        assert!(stream.read_frame().is_ok());
        assert!(stream.read_frame().is_ok());
        assert_eq!(stream.read_frame().unwrap_err(), SensorError::EndOfStream);
    }

    #[test]
    fn test_injected_failure_invalidates_stream() {
        let options = SyntheticOptions {
            fail_color_at: Some(2),
            ..Default::default()
        };
        let mut stream = open_stream(options, StreamKind::Color);
        assert!(stream.read_frame().is_ok());
        assert!(matches!(
            stream.read_frame(),
            Err(SensorError::ReadFailed {
                kind: StreamKind::Color,
                ..
            })
        ));
        assert!(!stream.is_valid());
    }

    #[test]
    fn test_set_mode_follows_requested_size() {
        let mut stream = open_stream(SyntheticOptions::default(), StreamKind::Depth);
        stream
            .set_mode(&StreamMode {
                width: 32,
                height: 16,
                fps: 25,
                format: PixelFormat::Depth1Mm,
            })
            .unwrap();
        let frame = stream.read_frame().unwrap();
        assert_eq!(frame.size(), (32, 16));
    }
}
