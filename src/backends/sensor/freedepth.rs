// SPDX-License-Identifier: GPL-3.0-only

//! Kinect depth sensor backend using freedepth
//!
//! freedepth streams RGB video and depth simultaneously over native USB,
//! bypassing V4L2. One `KinectStreamer` feeds both streams of a device: the
//! first stream to start brings the streamer up and each stream then owns the
//! receiving end of its own frame channel.
//!
//! Device URIs are `kinect:<index>`.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};

use freedepth::{DepthFormat, DepthFrame, KinectStreamer, Resolution, VideoFormat, VideoFrame};
use tracing::{debug, info, warn};

use super::{
    PixelFormat, RawFrame, RawPixels, SensorBackend, SensorDevice, SensorInfo, SensorStream,
    StreamKind, StreamMode,
};
use crate::constants::{KINECT_FPS, KINECT_MAX_DEPTH_MM, SENSOR_READ_TIMEOUT};
use crate::errors::{SensorError, SensorResult};

/// URI prefix selecting the freedepth backend
pub const KINECT_PREFIX: &str = "kinect:";

/// Extract the device index from a `kinect:<index>` URI
pub fn kinect_device_index(uri: &str) -> Option<usize> {
    uri.strip_prefix(KINECT_PREFIX)?.parse().ok()
}

/// freedepth runtime
#[derive(Debug, Default)]
pub struct FreedepthBackend;

impl FreedepthBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SensorBackend for FreedepthBackend {
    fn name(&self) -> &'static str {
        "freedepth"
    }

    fn enumerate(&self) -> Vec<SensorInfo> {
        match freedepth::enumerate_devices() {
            Ok(devices) => devices
                .iter()
                .map(|dev| SensorInfo {
                    name: dev.name.clone(),
                    uri: format!("{}{}", KINECT_PREFIX, dev.index),
                    backend: "freedepth",
                })
                .collect(),
            Err(e) => {
                debug!("Failed to enumerate depth cameras: {}", e);
                Vec::new()
            }
        }
    }

    fn open_device(&mut self, uri: &str) -> SensorResult<Box<dyn SensorDevice>> {
        let index = kinect_device_index(uri)
            .ok_or_else(|| SensorError::DeviceOpen(format!("invalid Kinect device: {}", uri)))?;

        // Creating the streamer unbinds the kernel driver
        let streamer = KinectStreamer::new(index).map_err(|e| {
            SensorError::DeviceOpen(format!("failed to create depth camera streamer: {}", e))
        })?;
        info!(device = index, "Opened Kinect via freedepth");

        Ok(Box::new(FreedepthDevice {
            shared: Rc::new(RefCell::new(KinectShared {
                streamer: Some(streamer),
                resolution: Resolution::Medium,
                video_rx: None,
                depth_rx: None,
                depth_converter: None,
            })),
        }))
    }

    fn shutdown(&mut self) {
        debug!("freedepth runtime shut down");
    }
}

/// State shared by a device and its two streams
struct KinectShared {
    streamer: Option<KinectStreamer>,
    resolution: Resolution,
    video_rx: Option<Receiver<VideoFrame>>,
    depth_rx: Option<Receiver<DepthFrame>>,
    depth_converter: Option<freedepth::DepthToMm>,
}

impl KinectShared {
    fn is_streaming(&self) -> bool {
        self.video_rx.is_some() || self.depth_rx.is_some()
    }

    fn ensure_streaming(&mut self, kind: StreamKind) -> SensorResult<()> {
        if self.is_streaming() {
            return Ok(());
        }
        let resolution = self.resolution;
        let streamer = self.streamer.as_mut().ok_or(SensorError::StreamStart {
            kind,
            message: "device closed".to_string(),
        })?;

        let (video_rx, depth_rx) = streamer
            .start(VideoFormat::Rgb, resolution, DepthFormat::Depth11Bit)
            .map_err(|e| SensorError::StreamStart {
                kind,
                message: e.to_string(),
            })?;

        // Device-calibrated raw-disparity to millimeter conversion
        let registration = streamer.create_depth_registration();
        self.depth_converter = Some(registration.depth_to_mm().clone());
        self.video_rx = Some(video_rx);
        self.depth_rx = Some(depth_rx);
        Ok(())
    }
}

struct FreedepthDevice {
    shared: Rc<RefCell<KinectShared>>,
}

impl SensorDevice for FreedepthDevice {
    fn has_sensor(&self, _kind: StreamKind) -> bool {
        true
    }

    fn create_stream(&mut self, kind: StreamKind) -> SensorResult<Box<dyn SensorStream>> {
        if self.shared.borrow().streamer.is_none() {
            return Err(SensorError::StreamCreate {
                kind,
                message: "device closed".to_string(),
            });
        }
        Ok(Box::new(FreedepthStream {
            kind,
            shared: Rc::clone(&self.shared),
            state: StreamState::Created,
            width: 640,
            height: 480,
            rgb: Vec::new(),
            depth_mm: Vec::new(),
            frames: 0,
        }))
    }

    fn close(&mut self) {
        let mut shared = self.shared.borrow_mut();
        shared.video_rx = None;
        shared.depth_rx = None;
        if let Some(mut streamer) = shared.streamer.take() {
            streamer.stop();
            if let Err(e) = streamer.rebind_driver() {
                warn!("Failed to rebind kernel driver: {}", e);
            }
        }
        info!("Kinect closed");
    }
}

enum StreamState {
    Created,
    Video(Receiver<VideoFrame>),
    Depth(Receiver<DepthFrame>, freedepth::DepthToMm),
    Invalid,
}

struct FreedepthStream {
    kind: StreamKind,
    shared: Rc<RefCell<KinectShared>>,
    state: StreamState,
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    depth_mm: Vec<u16>,
    frames: u64,
}

impl FreedepthStream {
    fn read_error(&self, message: impl Into<String>) -> SensorError {
        SensorError::ReadFailed {
            kind: self.kind,
            message: message.into(),
        }
    }
}

impl SensorStream for FreedepthStream {
    fn kind(&self) -> StreamKind {
        self.kind
    }

    fn set_mode(&mut self, mode: &StreamMode) -> SensorResult<()> {
        let set_mode_error = |message: String| SensorError::SetMode {
            kind: self.kind,
            message,
        };

        let resolution = match (self.kind, mode.width, mode.height) {
            (_, 640, 480) => Resolution::Medium,
            (StreamKind::Color, 1280, 1024) => Resolution::High,
            (_, w, h) => {
                return Err(set_mode_error(format!("{}x{} not supported", w, h)));
            }
        };
        match (self.kind, mode.format) {
            (StreamKind::Color, PixelFormat::Rgb888) | (StreamKind::Depth, PixelFormat::Depth1Mm) => {}
            (_, format) => return Err(set_mode_error(format!("format {} not supported", format))),
        }
        if mode.fps != KINECT_FPS {
            warn!(
                requested = mode.fps,
                native = KINECT_FPS,
                "Kinect streams at a fixed frame rate"
            );
        }

        let mut shared = self.shared.borrow_mut();
        if shared.is_streaming() {
            return Err(set_mode_error("stream already started".to_string()));
        }
        if self.kind == StreamKind::Color {
            shared.resolution = resolution;
        }
        self.width = mode.width;
        self.height = mode.height;
        Ok(())
    }

    fn start(&mut self) -> SensorResult<()> {
        let mut shared = self.shared.borrow_mut();
        shared.ensure_streaming(self.kind)?;

        self.state = match self.kind {
            StreamKind::Color => shared.video_rx.take().map(StreamState::Video),
            StreamKind::Depth => match (shared.depth_rx.take(), shared.depth_converter.clone()) {
                (Some(rx), Some(converter)) => Some(StreamState::Depth(rx, converter)),
                _ => None,
            },
        }
        .ok_or(SensorError::StreamStart {
            kind: self.kind,
            message: "stream already started".to_string(),
        })?;
        Ok(())
    }

    fn is_valid(&self) -> bool {
        matches!(self.state, StreamState::Video(_) | StreamState::Depth(..))
    }

    fn read_frame(&mut self) -> SensorResult<RawFrame<'_>> {
        let received = match &self.state {
            StreamState::Video(rx) => rx.recv_timeout(SENSOR_READ_TIMEOUT).map(Frame::Video),
            StreamState::Depth(rx, _) => rx.recv_timeout(SENSOR_READ_TIMEOUT).map(Frame::Depth),
            StreamState::Created | StreamState::Invalid => {
                return Err(SensorError::StreamInvalid(self.kind));
            }
        };

        let frame = match received {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => {
                return Err(self.read_error("timed out waiting for frame"));
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.state = StreamState::Invalid;
                return Err(SensorError::StreamInvalid(self.kind));
            }
        };
        self.frames += 1;

        match frame {
            Frame::Video(frame) => {
                // Kinect color is always Bayer at the hardware level
                let pixels = (frame.width * frame.height) as usize;
                self.rgb.resize(pixels * 3, 0);
                freedepth::convert_bayer_to_rgb(&frame.data, &mut self.rgb, frame.width, frame.height);
                Ok(RawFrame {
                    pixels: RawPixels::Color8 {
                        data: &self.rgb,
                        format: PixelFormat::Rgb888,
                    },
                    width: frame.width,
                    height: frame.height,
                    stride: frame.width as usize * 3,
                    frame_index: self.frames,
                })
            }
            Frame::Depth(frame) => {
                let raw = frame
                    .as_u16()
                    .ok_or_else(|| self.read_error("malformed depth frame"))?;
                self.depth_mm.resize(raw.len(), 0);
                if let StreamState::Depth(_, converter) = &self.state {
                    converter.convert_frame(raw, &mut self.depth_mm);
                }
                Ok(RawFrame {
                    pixels: RawPixels::DepthMm(&self.depth_mm),
                    width: frame.width,
                    height: frame.height,
                    stride: frame.width as usize,
                    frame_index: self.frames,
                })
            }
        }
    }

    fn max_pixel_value(&self) -> u32 {
        match self.kind {
            StreamKind::Color => 255,
            StreamKind::Depth => KINECT_MAX_DEPTH_MM,
        }
    }

    fn destroy(&mut self) {
        self.state = StreamState::Invalid;
        self.rgb = Vec::new();
        self.depth_mm = Vec::new();
        debug!(stream = %self.kind, frames = self.frames, "Kinect stream destroyed");
    }
}

enum Frame {
    Video(VideoFrame),
    Depth(DepthFrame),
}
