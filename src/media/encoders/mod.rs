// SPDX-License-Identifier: GPL-3.0-only

//! Output sinks
//!
//! A sink accepts one frame per call and fails per call; a failed write
//! leaves the sink usable for the next frame.

pub mod png;
pub mod video;

pub use png::PngWriter;
pub use video::MjpegAviSink;

use crate::errors::SinkResult;
use image::{GrayImage, RgbImage};
use std::path::Path;

/// A video stream bound to a fixed path and frame size for its lifetime
pub trait VideoSink {
    /// Frame size every written frame must have
    fn size(&self) -> (u32, u32);

    /// Append one frame
    ///
    /// A frame whose size differs from [`VideoSink::size`] is rejected with
    /// `SinkError::ResolutionMismatch`.
    fn write(&mut self, frame: &RgbImage) -> SinkResult<()>;

    /// Number of frames accepted so far
    fn frames_written(&self) -> u64;

    /// Flush and close the container; no writes are accepted afterwards
    fn finish(&mut self) -> SinkResult<()>;
}

/// Borrowed image handed to an [`ImageSink`]
#[derive(Debug, Clone, Copy)]
pub enum ImageRef<'a> {
    Rgb(&'a RgbImage),
    Gray(&'a GrayImage),
}

impl ImageRef<'_> {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            ImageRef::Rgb(img) => img.dimensions(),
            ImageRef::Gray(img) => img.dimensions(),
        }
    }
}

/// Writes still images to individual files
pub trait ImageSink {
    fn write_image(&mut self, path: &Path, image: ImageRef<'_>) -> SinkResult<()>;
}
