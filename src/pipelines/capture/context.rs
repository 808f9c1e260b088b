// SPDX-License-Identifier: GPL-3.0-only

//! State shared between the acquisition loop and the control thread
//!
//! Ownership is split by direction: the acquisition loop is the only writer
//! of [`FrameSlot`] and [`CaptureStatus`] counters, the control thread is the
//! main writer of [`OutputToggles`]. Neither side ever waits on the other;
//! a toggle flip may be seen one iteration late and the preview may lag one
//! frame behind.

use crate::media::NormalizedPair;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

/// Latest normalized pair, double-buffered
///
/// The writer fills the slot readers are not pointed at, then flips the
/// front index. Readers only hold a slot lock long enough to clone an `Arc`.
/// The writer never waits for one: if a reader that loaded the front index
/// before the last flip still holds the back slot, that publish is skipped
/// and the preview keeps the previous pair for one more frame.
pub struct FrameSlot {
    slots: [Mutex<Option<Arc<NormalizedPair>>>; 2],
    front: AtomicUsize,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self {
            slots: [Mutex::new(None), Mutex::new(None)],
            front: AtomicUsize::new(0),
        }
    }

    /// Make `pair` the latest frame; must only be called from one thread
    ///
    /// Returns `false` when the pair was skipped because a reader held the
    /// back slot.
    pub fn publish(&self, pair: Arc<NormalizedPair>) -> bool {
        let back = 1 - self.front.load(Ordering::Relaxed);
        let mut slot = match self.slots[back].try_lock() {
            Ok(slot) => slot,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };
        *slot = Some(pair);
        drop(slot);
        self.front.store(back, Ordering::Release);
        true
    }

    /// The most recently published pair, if any
    pub fn latest(&self) -> Option<Arc<NormalizedPair>> {
        let front = self.front.load(Ordering::Acquire);
        self.slots[front]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// A single-key command from the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    ToggleVideo,
    TogglePng,
    Screenshot,
    Quit,
}

impl ControlAction {
    /// Map a key to its action; unknown keys map to `None`
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            'v' => Some(ControlAction::ToggleVideo),
            'p' => Some(ControlAction::TogglePng),
            's' => Some(ControlAction::Screenshot),
            'q' => Some(ControlAction::Quit),
            _ => None,
        }
    }
}

/// Point-in-time copy of the toggles, for display and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleSnapshot {
    pub video: bool,
    pub png: bool,
    pub screenshot_pending: bool,
    pub running: bool,
}

/// Output toggles and the run flag
#[derive(Debug)]
pub struct OutputToggles {
    video: AtomicBool,
    png: AtomicBool,
    screenshot: AtomicBool,
    running: AtomicBool,
}

impl OutputToggles {
    pub fn new(video: bool, png: bool) -> Self {
        Self {
            video: AtomicBool::new(video),
            png: AtomicBool::new(png),
            screenshot: AtomicBool::new(false),
            running: AtomicBool::new(true),
        }
    }

    pub fn video_enabled(&self) -> bool {
        self.video.load(Ordering::Acquire)
    }

    pub fn png_enabled(&self) -> bool {
        self.png.load(Ordering::Acquire)
    }

    /// Flip video recording, returning the new state
    pub fn toggle_video(&self) -> bool {
        !self.video.fetch_xor(true, Ordering::AcqRel)
    }

    /// Flip PNG sequence recording, returning the new state
    pub fn toggle_png(&self) -> bool {
        !self.png.fetch_xor(true, Ordering::AcqRel)
    }

    /// Ask for one screenshot; requests made before it is taken coalesce
    pub fn request_screenshot(&self) {
        self.screenshot.store(true, Ordering::Release);
    }

    /// Consume a pending screenshot request
    pub fn take_screenshot_request(&self) -> bool {
        self.screenshot.swap(false, Ordering::AcqRel)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn snapshot(&self) -> ToggleSnapshot {
        ToggleSnapshot {
            video: self.video_enabled(),
            png: self.png_enabled(),
            screenshot_pending: self.screenshot.load(Ordering::Acquire),
            running: self.is_running(),
        }
    }

    /// Apply a user action and describe the result for the status line
    pub fn apply(&self, action: ControlAction) -> String {
        match action {
            ControlAction::ToggleVideo => {
                format!("Video recording {}", on_off(self.toggle_video()))
            }
            ControlAction::TogglePng => {
                format!("PNG recording {}", on_off(self.toggle_png()))
            }
            ControlAction::Screenshot => {
                self.request_screenshot();
                "Screenshot requested".to_string()
            }
            ControlAction::Quit => {
                self.request_stop();
                "Stopping".to_string()
            }
        }
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

/// Counters and the last user-facing message, for the status line and shutdown stats
#[derive(Debug, Default)]
pub struct CaptureStatus {
    iterations: AtomicU64,
    sink_failures: AtomicU64,
    message: Mutex<String>,
}

impl CaptureStatus {
    pub fn record_iteration(&self, iteration: u64) {
        self.iterations.store(iteration, Ordering::Release);
    }

    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Acquire)
    }

    pub fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::AcqRel);
    }

    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Acquire)
    }

    pub fn set_message(&self, message: impl Into<String>) {
        *self.message.lock().unwrap_or_else(PoisonError::into_inner) = message.into();
    }

    pub fn message(&self) -> String {
        self.message
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Everything both threads share, built once per run
#[derive(Default)]
pub struct CaptureContext {
    pub frames: FrameSlot,
    pub toggles: OutputToggles,
    pub status: CaptureStatus,
}

impl CaptureContext {
    pub fn new(video: bool, png: bool) -> Self {
        Self {
            frames: FrameSlot::new(),
            toggles: OutputToggles::new(video, png),
            status: CaptureStatus::default(),
        }
    }
}

impl Default for OutputToggles {
    fn default() -> Self {
        Self::new(false, false)
    }
}
