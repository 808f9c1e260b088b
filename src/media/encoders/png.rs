// SPDX-License-Identifier: GPL-3.0-only

//! PNG still image writer

use super::{ImageRef, ImageSink};
use crate::errors::{SinkError, SinkResult};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Writes PNG files with the fastest compression setting
///
/// Recording a PNG pair per frame is throughput-bound, so size is traded for speed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngWriter;

impl PngWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ImageSink for PngWriter {
    fn write_image(&mut self, path: &Path, image: ImageRef<'_>) -> SinkResult<()> {
        let io_error = |source: std::io::Error| SinkError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = BufWriter::new(File::create(path).map_err(io_error)?);
        let encoder = PngEncoder::new_with_quality(
            &mut writer,
            CompressionType::Fast,
            FilterType::NoFilter,
        );

        let (width, height) = image.dimensions();
        match image {
            ImageRef::Rgb(img) => {
                encoder.write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)?
            }
            ImageRef::Gray(img) => {
                encoder.write_image(img.as_raw(), width, height, ExtendedColorType::L8)?
            }
        }
        // Dropping a BufWriter discards flush errors, small files fail only here
        writer.flush().map_err(io_error)?;

        debug!(path = %path.display(), width, height, "PNG written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn test_rgb_png_roundtrip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("color.png");
        let img = RgbImage::from_fn(7, 5, |x, y| Rgb([x as u8 * 30, y as u8 * 50, 200]));

        PngWriter::new()
            .write_image(&path, ImageRef::Rgb(&img))
            .unwrap();

        let loaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(loaded, img);
    }

    #[test]
    fn test_gray_png_keeps_single_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depth.png");
        let img = GrayImage::from_fn(4, 4, |x, y| Luma([(x * 16 + y) as u8]));

        PngWriter::new()
            .write_image(&path, ImageRef::Gray(&img))
            .unwrap();

        let loaded = image::open(&path).unwrap();
        assert_eq!(loaded.color(), image::ColorType::L8);
        assert_eq!(loaded.to_luma8(), img);
    }

    #[test]
    fn test_missing_directory_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("x.png");
        let img = GrayImage::new(1, 1);

        let err = PngWriter::new()
            .write_image(&path, ImageRef::Gray(&img))
            .unwrap_err();
        assert!(matches!(err, SinkError::Io { .. }));
        assert!(err.to_string().contains("x.png"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_full_disk_is_reported() {
        let img = GrayImage::new(4, 4);
        let err = PngWriter::new()
            .write_image(Path::new("/dev/full"), ImageRef::Gray(&img))
            .unwrap_err();
        assert!(matches!(err, SinkError::Io { .. }));
    }
}
