// SPDX-License-Identifier: GPL-3.0-only

//! Motion-JPEG/AVI video sink
//!
//! Frames are pushed into a GStreamer pipeline:
//!
//! ```text
//! appsrc (RGB) → videoconvert → jpegenc → avimux → filesink
//! ```
//!
//! Every buffer is stamped `n / fps`, so the container holds exactly one
//! frame per accepted write regardless of how fast the loop runs. The appsrc
//! queue is bounded to a few raw frames; when the encoder falls behind,
//! `write` blocks instead of dropping frames or growing memory.

use super::VideoSink;
use crate::constants::{VIDEO_FINALIZE_TIMEOUT, VIDEO_JPEG_QUALITY, VIDEO_QUEUE_FRAMES};
use crate::errors::{SinkError, SinkResult};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::AppSrc;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// One AVI file fed frame by frame
pub struct MjpegAviSink {
    pipeline: gst::Pipeline,
    appsrc: AppSrc,
    path: PathBuf,
    width: u32,
    height: u32,
    fps: u32,
    frames: u64,
    finished: bool,
}

impl MjpegAviSink {
    /// Build the pipeline and start it so frames can be pushed right away
    pub fn create(path: &Path, width: u32, height: u32, fps: u32) -> SinkResult<Self> {
        if fps == 0 {
            return Err(SinkError::Pipeline("frame rate must be positive".into()));
        }
        info!(path = %path.display(), width, height, fps, "Creating MJPEG video sink");

        gst::init().map_err(|e| SinkError::Pipeline(format!("GStreamer init failed: {}", e)))?;

        let make = |factory: &str| {
            gst::ElementFactory::make(factory)
                .build()
                .map_err(|e| SinkError::Pipeline(format!("Failed to create {}: {}", factory, e)))
        };

        let appsrc = make("appsrc")?
            .downcast::<AppSrc>()
            .map_err(|_| SinkError::Pipeline("Failed to downcast to AppSrc".into()))?;
        let convert = make("videoconvert")?;
        let encoder = make("jpegenc")?;
        let muxer = make("avimux")?;
        let filesink = make("filesink")?;

        encoder.set_property("quality", VIDEO_JPEG_QUALITY);
        filesink.set_property("location", path.to_string_lossy().to_string());

        let caps = gstreamer_video::VideoInfo::builder(gstreamer_video::VideoFormat::Rgb, width, height)
            .fps(gst::Fraction::new(fps as i32, 1))
            .build()
            .and_then(|info| info.to_caps())
            .map_err(|e| SinkError::Pipeline(format!("Invalid video caps: {}", e)))?;
        appsrc.set_caps(Some(&caps));
        appsrc.set_format(gst::Format::Time);
        appsrc.set_is_live(false);
        appsrc.set_max_bytes(u64::from(width) * u64::from(height) * 3 * VIDEO_QUEUE_FRAMES);
        appsrc.set_block(true);

        let pipeline = gst::Pipeline::new();
        let elements = [appsrc.upcast_ref(), &convert, &encoder, &muxer, &filesink];
        pipeline
            .add_many(elements)
            .map_err(|e| SinkError::Pipeline(format!("Failed to add elements: {}", e)))?;
        gst::Element::link_many(elements)
            .map_err(|e| SinkError::Pipeline(format!("Failed to link elements: {}", e)))?;

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| SinkError::Pipeline(format!("Failed to start pipeline: {}", e)))?;

        Ok(Self {
            pipeline,
            appsrc,
            path: path.to_path_buf(),
            width,
            height,
            fps,
            frames: 0,
            finished: false,
        })
    }

    fn frame_time(&self, index: u64) -> gst::ClockTime {
        gst::ClockTime::from_nseconds(index * 1_000_000_000 / u64::from(self.fps))
    }

    /// Surface an error the pipeline posted since the last check
    fn pending_error(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        let msg = bus.pop_filtered(&[gst::MessageType::Error])?;
        match msg.view() {
            gst::MessageView::Error(err) => {
                error!(
                    error = %err.error(),
                    debug = ?err.debug(),
                    source = ?err.src().map(|s| s.name()),
                    "GStreamer error in video sink"
                );
                Some(err.error().to_string())
            }
            _ => None,
        }
    }
}

impl VideoSink for MjpegAviSink {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn write(&mut self, frame: &RgbImage) -> SinkResult<()> {
        if self.finished {
            return Err(SinkError::Pipeline("video already finalized".into()));
        }
        if frame.dimensions() != (self.width, self.height) {
            return Err(SinkError::ResolutionMismatch {
                expected: (self.width, self.height),
                actual: frame.dimensions(),
            });
        }
        if let Some(message) = self.pending_error() {
            return Err(SinkError::Pipeline(message));
        }

        let pts = self.frame_time(self.frames);
        let duration = self.frame_time(self.frames + 1) - pts;

        let mut buffer = gst::Buffer::from_slice(frame.as_raw().clone());
        {
            let buffer_ref = buffer
                .get_mut()
                .ok_or_else(|| SinkError::Pipeline("Failed to get mutable buffer reference".into()))?;
            buffer_ref.set_pts(pts);
            buffer_ref.set_duration(duration);
        }

        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| SinkError::Pipeline(format!("Failed to push frame: {:?}", e)))?;
        self.frames += 1;
        if self.frames % 100 == 0 {
            debug!(path = %self.path.display(), frames = self.frames, "Video frames pushed");
        }
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn finish(&mut self) -> SinkResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        // EOS lets avimux rewrite its header with the final frame count
        self.appsrc
            .end_of_stream()
            .map_err(|e| SinkError::Pipeline(format!("Failed to send EOS: {:?}", e)))?;

        let result = match self.pipeline.bus() {
            Some(bus) => match bus.timed_pop_filtered(
                gst::ClockTime::from_nseconds(VIDEO_FINALIZE_TIMEOUT.as_nanos() as u64),
                &[gst::MessageType::Eos, gst::MessageType::Error],
            ) {
                Some(msg) => match msg.view() {
                    gst::MessageView::Error(err) => {
                        Err(SinkError::Pipeline(format!("Finalizing failed: {}", err.error())))
                    }
                    _ => Ok(()),
                },
                None => {
                    warn!(path = %self.path.display(), "Timed out waiting for video to finalize");
                    Ok(())
                }
            },
            None => Err(SinkError::Pipeline("No bus available".into())),
        };

        self.pipeline
            .set_state(gst::State::Null)
            .map_err(|e| SinkError::Pipeline(format!("Failed to stop pipeline: {}", e)))?;

        info!(path = %self.path.display(), frames = self.frames, "Video saved");
        result
    }
}

impl Drop for MjpegAviSink {
    fn drop(&mut self) {
        if !self.finished
            && let Err(e) = self.finish()
        {
            error!(path = %self.path.display(), error = %e, "Failed to finalize video on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_fps_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = MjpegAviSink::create(&dir.path().join("v.avi"), 64, 48, 0);
        assert!(matches!(result, Err(SinkError::Pipeline(_))));
    }

    fn encoders_available() -> bool {
        gst::init().is_ok()
            && ["appsrc", "videoconvert", "jpegenc", "avimux", "filesink"]
                .iter()
                .all(|name| gst::ElementFactory::find(name).is_some())
    }

    /// `(dwMicroSecPerFrame, dwTotalFrames)` from the AVI main header
    fn avi_main_header(bytes: &[u8]) -> Option<(u32, u32)> {
        let start = bytes.windows(4).position(|w| w == b"avih")? + 8;
        let field = |offset: usize| {
            bytes
                .get(start + offset..start + offset + 4)
                .and_then(|b| b.try_into().ok())
                .map(u32::from_le_bytes)
        };
        Some((field(0)?, field(16)?))
    }

    #[test]
    fn test_every_written_frame_lands_in_the_file() {
        if !encoders_available() {
            eprintln!("GStreamer JPEG/AVI elements missing, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video_color.avi");
        let mut sink = MjpegAviSink::create(&path, 64, 48, 25).unwrap();

        for i in 0..12u8 {
            let frame = RgbImage::from_pixel(64, 48, image::Rgb([i * 20, 100, 200]));
            sink.write(&frame).unwrap();
        }
        assert_eq!(sink.frames_written(), 12);
        sink.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"AVI ");
        let (micros_per_frame, total_frames) = avi_main_header(&bytes).unwrap();
        assert_eq!(total_frames, 12);
        assert_eq!(micros_per_frame, 40_000);
    }

    #[test]
    fn test_queue_is_bounded_and_blocking() {
        if !encoders_available() {
            eprintln!("GStreamer JPEG/AVI elements missing, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let mut sink = MjpegAviSink::create(&dir.path().join("v.avi"), 64, 48, 25).unwrap();
        assert!(sink.appsrc.property::<bool>("block"));
        assert_eq!(
            sink.appsrc.property::<u64>("max-bytes"),
            64 * 48 * 3 * VIDEO_QUEUE_FRAMES
        );
        sink.write(&RgbImage::new(64, 48)).unwrap();
        sink.finish().unwrap();
    }

    #[test]
    fn test_write_after_finish_is_rejected() {
        if !encoders_available() {
            eprintln!("GStreamer JPEG/AVI elements missing, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let mut sink = MjpegAviSink::create(&dir.path().join("v.avi"), 16, 16, 25).unwrap();
        sink.write(&RgbImage::new(16, 16)).unwrap();
        sink.finish().unwrap();

        let err = sink.write(&RgbImage::new(16, 16)).unwrap_err();
        assert!(matches!(err, SinkError::Pipeline(_)));
        assert_eq!(sink.frames_written(), 1);
    }
}
