// SPDX-License-Identifier: GPL-3.0-only

//! Frame normalization
//!
//! Converts raw sensor frames into owned images that sinks and the preview
//! can use directly:
//!
//! - color: packed 8-bit color, reordered to the channel order of the sinks
//! - depth: 8-bit grayscale scaled by the depth range, plus a 3-channel
//!   visualization with the gray value replicated
//!
//! Everything here is pure; the raw buffers are copied exactly once.

use crate::backends::sensor::{FramePair, PixelFormat, RawFrame, RawPixels};
use image::{GrayImage, RgbImage};
use std::fmt;

/// Channel order of packed 3-channel images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

impl ChannelOrder {
    fn of(format: PixelFormat) -> Option<Self> {
        match format {
            PixelFormat::Rgb888 => Some(ChannelOrder::Rgb),
            PixelFormat::Bgr888 => Some(ChannelOrder::Bgr),
            PixelFormat::Depth1Mm => None,
        }
    }
}

/// Channel order every sink in this crate expects (`image` buffers, GStreamer `RGB` caps)
pub const SINK_CHANNEL_ORDER: ChannelOrder = ChannelOrder::Rgb;

/// Normalization errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// Depth scaling requires a non-zero range
    ZeroMaxDepth,
    /// The frame does not hold the pixel type the conversion needs
    WrongPixelType(&'static str),
    /// The buffer is shorter than width, height and stride imply
    ShortBuffer { expected: usize, actual: usize },
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::ZeroMaxDepth => write!(f, "maximum depth value is 0"),
            NormalizeError::WrongPixelType(expected) => write!(f, "expected a {} frame", expected),
            NormalizeError::ShortBuffer { expected, actual } => write!(
                f,
                "frame buffer holds {} elements, {} required",
                actual, expected
            ),
        }
    }
}

impl std::error::Error for NormalizeError {}

/// One iteration's images, shared between the acquisition loop and the preview
#[derive(Debug, Clone)]
pub struct NormalizedPair {
    /// Acquisition iteration that produced the pair (1-based)
    pub iteration: u64,
    pub color: RgbImage,
    pub depth_gray: GrayImage,
    pub depth_visual: RgbImage,
}

/// Normalize a color/depth pair
pub fn normalize_pair(
    pair: &FramePair<'_>,
    max_depth: u32,
    iteration: u64,
) -> Result<NormalizedPair, NormalizeError> {
    let color = normalize_color(&pair.color, SINK_CHANNEL_ORDER)?;
    let depth_gray = depth_to_gray(&pair.depth, max_depth)?;
    let depth_visual = gray_to_rgb(&depth_gray);
    Ok(NormalizedPair {
        iteration,
        color,
        depth_gray,
        depth_visual,
    })
}

/// Copy a packed color frame into an image with `target` channel order
///
/// When the frame's order differs from `target`, the first and third
/// channels are swapped.
pub fn normalize_color(frame: &RawFrame<'_>, target: ChannelOrder) -> Result<RgbImage, NormalizeError> {
    let RawPixels::Color8 { data, format } = frame.pixels else {
        return Err(NormalizeError::WrongPixelType("color"));
    };
    let source = ChannelOrder::of(format).ok_or(NormalizeError::WrongPixelType("color"))?;

    let width = frame.width as usize;
    let height = frame.height as usize;
    check_len(data.len(), frame.stride, width * 3, height)?;

    let swap = source != target;
    let mut out = Vec::with_capacity(width * height * 3);
    for row in data.chunks(frame.stride.max(1)).take(height) {
        for px in row[..width * 3].chunks_exact(3) {
            if swap {
                out.extend_from_slice(&[px[2], px[1], px[0]]);
            } else {
                out.extend_from_slice(px);
            }
        }
    }

    image_from_raw(frame.width, frame.height, out)
}

/// Scale a single depth value to 8 bits: `round(d * 255 / max_depth)`, clamped to 255
///
/// `max_depth` must be non-zero.
#[inline]
pub fn scale_depth(d: u16, max_depth: u32) -> u8 {
    let max = u64::from(max_depth);
    ((u64::from(d) * 255 + max / 2) / max).min(255) as u8
}

/// Convert a millimeter depth frame to 8-bit grayscale
pub fn depth_to_gray(frame: &RawFrame<'_>, max_depth: u32) -> Result<GrayImage, NormalizeError> {
    if max_depth == 0 {
        return Err(NormalizeError::ZeroMaxDepth);
    }
    let RawPixels::DepthMm(values) = frame.pixels else {
        return Err(NormalizeError::WrongPixelType("depth"));
    };

    let width = frame.width as usize;
    let height = frame.height as usize;
    check_len(values.len(), frame.stride, width, height)?;

    let mut out = Vec::with_capacity(width * height);
    for row in values.chunks(frame.stride.max(1)).take(height) {
        out.extend(row[..width].iter().map(|&d| scale_depth(d, max_depth)));
    }

    image_from_raw(frame.width, frame.height, out)
}

/// Replicate a grayscale image across three channels
pub fn gray_to_rgb(gray: &GrayImage) -> RgbImage {
    let mut rgb = Vec::with_capacity(gray.as_raw().len() * 3);
    for &v in gray.as_raw() {
        rgb.extend_from_slice(&[v, v, v]);
    }
    RgbImage::from_raw(gray.width(), gray.height(), rgb)
        .unwrap_or_else(|| RgbImage::new(gray.width(), gray.height()))
}

fn check_len(len: usize, stride: usize, row_len: usize, rows: usize) -> Result<(), NormalizeError> {
    if rows == 0 {
        return Ok(());
    }
    if stride < row_len {
        return Err(NormalizeError::ShortBuffer {
            expected: row_len,
            actual: stride,
        });
    }
    let expected = stride * (rows - 1) + row_len;
    if len < expected {
        return Err(NormalizeError::ShortBuffer {
            expected,
            actual: len,
        });
    }
    Ok(())
}

fn image_from_raw<P: image::Pixel<Subpixel = u8>>(
    width: u32,
    height: u32,
    data: Vec<u8>,
) -> Result<image::ImageBuffer<P, Vec<u8>>, NormalizeError> {
    let actual = data.len();
    image::ImageBuffer::from_raw(width, height, data).ok_or(NormalizeError::ShortBuffer {
        expected: width as usize * height as usize * P::CHANNEL_COUNT as usize,
        actual,
    })
}
