// SPDX-License-Identifier: GPL-3.0-only

//! Output locations for a recording run
//!
//! Every run writes into its own directory named after the start time:
//!
//! ```text
//! <root>/2024-03-05_14-07-09/
//!   video_color.avi
//!   video_depth.avi
//!   frame_20240305T140709.123456_rgb.png
//!   frame_20240305T140709.123456_depth.png
//!   screenshot_20240305T140711.004211_rgb.png
//!   ...
//! ```

use crate::constants::{DEFAULT_SAVE_FOLDER, RUN_DIRECTORY_FORMAT, VIDEO_EXTENSION};
use crate::errors::StartupError;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default output root: `<platform video dir>/DepthRecorder`
pub fn default_output_root() -> PathBuf {
    dirs::video_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Videos")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_SAVE_FOLDER)
}

/// A color/depth pair of output paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairPaths {
    pub color: PathBuf,
    pub depth: PathBuf,
}

/// The directory of a single run
#[derive(Debug, Clone)]
pub struct RunDirectory {
    path: PathBuf,
}

impl RunDirectory {
    /// Create `<root>/<start time>`
    ///
    /// The root is created if missing. The run directory itself must not
    /// exist yet, so two runs never share (and overwrite) one directory.
    pub fn create(root: &Path, started: NaiveDateTime) -> Result<Self, StartupError> {
        std::fs::create_dir_all(root).map_err(|source| StartupError::Storage {
            path: root.to_path_buf(),
            source,
        })?;

        let path = root.join(started.format(RUN_DIRECTORY_FORMAT).to_string());
        std::fs::create_dir(&path).map_err(|source| StartupError::Storage {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), "Created run directory");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<stem>.avi` inside the run directory
    pub fn video_path(&self, stem: &str) -> PathBuf {
        self.path.join(format!("{}.{}", stem, VIDEO_EXTENSION))
    }

    /// PNG sequence files for one iteration
    pub fn frame_paths(&self, timestamp: &str) -> PairPaths {
        self.pair_paths("frame", timestamp)
    }

    /// Screenshot files
    pub fn screenshot_paths(&self, timestamp: &str) -> PairPaths {
        self.pair_paths("screenshot", timestamp)
    }

    fn pair_paths(&self, prefix: &str, timestamp: &str) -> PairPaths {
        PairPaths {
            color: self.path.join(format!("{}_{}_rgb.png", prefix, timestamp)),
            depth: self.path.join(format!("{}_{}_depth.png", prefix, timestamp)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::VIDEO_COLOR_STEM;
    use chrono::NaiveDate;

    fn started() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 9)
            .unwrap()
    }

    #[test]
    fn test_run_directory_name() {
        let root = tempfile::tempdir().unwrap();
        let run = RunDirectory::create(root.path(), started()).unwrap();
        assert_eq!(run.path(), root.path().join("2024-03-05_14-07-09"));
        assert!(run.path().is_dir());
    }

    #[test]
    fn test_missing_root_is_created() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        let run = RunDirectory::create(&nested, started()).unwrap();
        assert!(run.path().starts_with(&nested));
    }

    #[test]
    fn test_existing_run_directory_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        RunDirectory::create(root.path(), started()).unwrap();
        let err = RunDirectory::create(root.path(), started()).unwrap_err();
        assert!(matches!(err, StartupError::Storage { .. }));
    }

    #[test]
    fn test_output_file_names() {
        let root = tempfile::tempdir().unwrap();
        let run = RunDirectory::create(root.path(), started()).unwrap();
        let ts = "20240305T140709.000001";

        let frame = run.frame_paths(ts);
        assert_eq!(
            frame.color.file_name().unwrap(),
            "frame_20240305T140709.000001_rgb.png"
        );
        assert_eq!(
            frame.depth.file_name().unwrap(),
            "frame_20240305T140709.000001_depth.png"
        );

        let shot = run.screenshot_paths(ts);
        assert_eq!(
            shot.color.file_name().unwrap(),
            "screenshot_20240305T140709.000001_rgb.png"
        );
        assert_eq!(
            run.video_path(VIDEO_COLOR_STEM).file_name().unwrap(),
            "video_color.avi"
        );
    }
}
