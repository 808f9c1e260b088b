// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use chrono::NaiveDate;
use depth_recorder::constants::{
    CONTROL_POLL_INTERVAL, FRAME_TIMESTAMP_FORMAT, KEY_HELP, KEY_HINT, RUN_DIRECTORY_FORMAT,
    VIDEO_COLOR_STEM, VIDEO_DEPTH_STEM,
};
use std::time::Duration;

#[test]
fn test_timestamp_formats() {
    let at = NaiveDate::from_ymd_opt(2023, 11, 2)
        .unwrap()
        .and_hms_micro_opt(8, 30, 5, 7)
        .unwrap();
    assert_eq!(
        at.format(RUN_DIRECTORY_FORMAT).to_string(),
        "2023-11-02_08-30-05"
    );
    assert_eq!(
        at.format(FRAME_TIMESTAMP_FORMAT).to_string(),
        "20231102T083005.000007"
    );
}

#[test]
fn test_poll_interval_is_tens_of_milliseconds() {
    assert!(CONTROL_POLL_INTERVAL >= Duration::from_millis(10));
    assert!(CONTROL_POLL_INTERVAL < Duration::from_millis(100));
}

#[test]
fn test_video_file_names_differ() {
    assert_ne!(VIDEO_COLOR_STEM, VIDEO_DEPTH_STEM);
}

#[test]
fn test_key_help_lists_every_binding() {
    for key in ["v -", "p -", "s -", "q -"] {
        assert!(KEY_HELP.contains(key), "missing {}", key);
    }
    for key in ["'v'", "'p'", "'s'", "'q'"] {
        assert!(KEY_HINT.contains(key), "missing {}", key);
    }
}
