// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use depth_recorder::RecorderConfig;
use depth_recorder::config::{load_config, load_config_file, parse_config};
use depth_recorder::constants::{DEFAULT_DEVICE, DEFAULT_FPS, DEFAULT_SAVE_FOLDER};
use std::io::Write;

#[test]
fn test_config_default() {
    // Test that default config can be created
    let config = RecorderConfig::default();

    // Check sensible defaults
    assert_eq!((config.width, config.height), (640, 480));
    assert_eq!(config.fps, DEFAULT_FPS);
    assert_eq!(config.device, DEFAULT_DEVICE);
    assert!(!config.write_video, "Video recording should start off");
    assert!(!config.write_png, "PNG recording should start off");
    assert!(config.directory.ends_with(DEFAULT_SAVE_FOLDER));
}

#[test]
fn test_empty_map_gives_defaults() {
    let config = RecorderConfig::from_map(&Default::default()).unwrap();
    assert_eq!(config, RecorderConfig::default());
}

#[test]
fn test_load_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "width = 320").unwrap();
    writeln!(file, "height = 240").unwrap();
    writeln!(file, "directory = /tmp/recordings").unwrap();
    writeln!(file, "writeavi = 1").unwrap();
    writeln!(file, "writepng = 0").unwrap();

    let map = load_config_file(file.path()).unwrap();
    let config = RecorderConfig::from_map(&map).unwrap();
    assert_eq!((config.width, config.height), (320, 240));
    assert_eq!(config.directory.to_str(), Some("/tmp/recordings"));
    assert!(config.write_video);
    assert!(!config.write_png);
}

#[test]
fn test_explicit_config_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.ini");
    assert!(load_config(Some(&missing)).is_err());
}

#[test]
fn test_unknown_keys_are_ignored() {
    let map = parse_config("video_color_dir = /tmp/a\nwidth = 800\n").unwrap();
    let config = RecorderConfig::from_map(&map).unwrap();
    assert_eq!(config.width, 800);
}
