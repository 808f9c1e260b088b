// SPDX-License-Identifier: GPL-3.0-only

//! Recorder configuration
//!
//! Settings come from a flat INI file:
//!
//! ```ini
//! # config.ini
//! width = 640
//! height = 480
//! directory = /data/recordings
//! writeavi = 0
//! writepng = 1
//! fps = 25
//! device = kinect:0
//! ```
//!
//! Command line flags override the file; missing keys fall back to defaults.

use crate::constants::{
    CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE, DEFAULT_DEVICE, DEFAULT_FPS, DEFAULT_HEIGHT,
    DEFAULT_WIDTH,
};
use crate::errors::StartupError;
use crate::storage::default_output_root;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Raw key/value settings as read from the file
pub type ConfigMap = HashMap<String, String>;

/// Parse INI text into a flat map
///
/// `#` and `;` start comment lines, `[section]` headers are ignored and a
/// repeated key keeps its last value. Keys are lowercased.
pub fn parse_config(text: &str) -> Result<ConfigMap, StartupError> {
    let mut map = ConfigMap::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty()
            || line.starts_with('#')
            || line.starts_with(';')
            || (line.starts_with('[') && line.ends_with(']'))
        {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| {
            StartupError::Config(format!("line {}: expected 'key = value'", number + 1))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(StartupError::Config(format!("line {}: empty key", number + 1)));
        }
        let value = value.trim().trim_matches('"');
        map.insert(key.to_ascii_lowercase(), value.to_string());
    }
    Ok(map)
}

/// Read and parse a config file
pub fn load_config_file(path: &Path) -> Result<ConfigMap, StartupError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| StartupError::Config(format!("{}: {}", path.display(), e)))?;
    let map = parse_config(&text)?;
    debug!(path = %path.display(), keys = map.len(), "Loaded config file");
    Ok(map)
}

/// Load settings from the first config location that applies
///
/// An explicit path (`--config` or the environment variable) must exist.
/// The default `config.ini` is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<ConfigMap, StartupError> {
    let env_path = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    if let Some(path) = explicit.map(Path::to_path_buf).or(env_path) {
        return load_config_file(&path);
    }

    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.is_file() {
        load_config_file(default_path)
    } else {
        info!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
        Ok(ConfigMap::new())
    }
}

/// Typed recorder settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderConfig {
    pub width: u32,
    pub height: u32,
    /// Root under which each run gets its own directory
    pub directory: PathBuf,
    /// Initial state of video recording
    pub write_video: bool,
    /// Initial state of PNG sequence recording
    pub write_png: bool,
    pub fps: u32,
    /// Sensor URI (`kinect:<n>` or `stub://<name>`)
    pub device: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            directory: default_output_root(),
            write_video: false,
            write_png: false,
            fps: DEFAULT_FPS,
            device: DEFAULT_DEVICE.to_string(),
        }
    }
}

impl RecorderConfig {
    /// Build typed settings from a map; malformed values name their key
    pub fn from_map(map: &ConfigMap) -> Result<Self, StartupError> {
        let defaults = Self::default();
        Ok(Self {
            width: positive(map, "width")?.unwrap_or(defaults.width),
            height: positive(map, "height")?.unwrap_or(defaults.height),
            directory: map
                .get("directory")
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.directory),
            write_video: flag(map, "writeavi")?.unwrap_or(defaults.write_video),
            write_png: flag(map, "writepng")?.unwrap_or(defaults.write_png),
            fps: positive(map, "fps")?.unwrap_or(defaults.fps),
            device: map
                .get("device")
                .filter(|device| !device.is_empty())
                .cloned()
                .unwrap_or(defaults.device),
        })
    }

    /// Apply command line overrides on top of the file settings
    pub fn apply(&mut self, overrides: &ConfigOverrides) -> Result<(), StartupError> {
        for (key, value) in [
            ("width", overrides.width),
            ("height", overrides.height),
            ("fps", overrides.fps),
        ] {
            if value == Some(0) {
                return Err(StartupError::Config(format!("{} must be positive", key)));
            }
        }
        if let Some(width) = overrides.width {
            self.width = width;
        }
        if let Some(height) = overrides.height {
            self.height = height;
        }
        if let Some(fps) = overrides.fps {
            self.fps = fps;
        }
        if let Some(directory) = &overrides.directory {
            self.directory.clone_from(directory);
        }
        if let Some(device) = &overrides.device {
            self.device.clone_from(device);
        }
        if let Some(video) = overrides.video {
            self.write_video = video;
        }
        if let Some(png) = overrides.png {
            self.write_png = png;
        }
        Ok(())
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub directory: Option<PathBuf>,
    pub device: Option<String>,
    pub video: Option<bool>,
    pub png: Option<bool>,
}

fn positive<T>(map: &ConfigMap, key: &str) -> Result<Option<T>, StartupError>
where
    T: FromStr + PartialEq + Default,
{
    let Some(raw) = map.get(key) else {
        return Ok(None);
    };
    match raw.parse::<T>() {
        Ok(value) if value != T::default() => Ok(Some(value)),
        _ => Err(StartupError::Config(format!(
            "{} must be a positive integer, got '{}'",
            key, raw
        ))),
    }
}

fn flag(map: &ConfigMap, key: &str) -> Result<Option<bool>, StartupError> {
    let Some(raw) = map.get(key) else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(StartupError::Config(format!(
            "{} must be 0 or 1, got '{}'",
            key, raw
        ))),
    }
}
