// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Default frame width when the config does not set one
pub const DEFAULT_WIDTH: u32 = 640;

/// Default frame height when the config does not set one
pub const DEFAULT_HEIGHT: u32 = 480;

/// Default frame rate for both streams and the recorded videos
pub const DEFAULT_FPS: u32 = 25;

/// Default sensor URI
pub const DEFAULT_DEVICE: &str = "kinect:0";

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.ini";

/// Environment variable pointing at a config file
pub const CONFIG_ENV_VAR: &str = "DEPTH_RECORDER_CONFIG";

/// Folder created under the platform video directory when no `directory` is configured
pub const DEFAULT_SAVE_FOLDER: &str = "DepthRecorder";

/// Control thread render and key-poll interval
pub const CONTROL_POLL_INTERVAL: Duration = Duration::from_millis(30);

/// How long a stream read may block before it counts as failed
pub const SENSOR_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Depth range reported for Kinect depth streams (millimeters)
pub const KINECT_MAX_DEPTH_MM: u32 = 10_000;

/// Native Kinect frame rate
pub const KINECT_FPS: u32 = 30;

/// Depth range of the synthetic sensor (millimeters)
pub const SYNTHETIC_MAX_DEPTH_MM: u32 = 4_000;

/// Video file stem for the color stream
pub const VIDEO_COLOR_STEM: &str = "video_color";

/// Video file stem for the depth visualization stream
pub const VIDEO_DEPTH_STEM: &str = "video_depth";

/// Container extension of recorded videos (Motion-JPEG in AVI)
pub const VIDEO_EXTENSION: &str = "avi";

/// JPEG quality of recorded video frames
pub const VIDEO_JPEG_QUALITY: i32 = 90;

/// Raw frames a video sink may queue before `write` blocks on the encoder
pub const VIDEO_QUEUE_FRAMES: u64 = 8;

/// How long finalizing a video may wait for the muxer to drain
pub const VIDEO_FINALIZE_TIMEOUT: Duration = Duration::from_secs(5);

/// Run directory name format (local time)
pub const RUN_DIRECTORY_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Per-iteration timestamp format (local time, microseconds)
pub const FRAME_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.6f";

/// Key bindings printed at startup
pub const KEY_HELP: &str = "v - toggle video recording\n\
                            p - toggle PNG sequence recording\n\
                            s - take and save screenshot\n\
                            q - quit";

/// One-line form of [`KEY_HELP`] for the preview status bar
pub const KEY_HINT: &str = "'v' video 'p' png 's' screenshot 'q' quit";
