// SPDX-License-Identifier: GPL-3.0-only

//! Capture, convert and dispatch
//!
//! Two threads share one [`CaptureContext`]:
//!
//! ```text
//! ┌──────────────────── main thread ────────────────────┐
//! │ SensorSource ─▶ normalize ─▶ FrameSlot::publish     │
//! │                          └──▶ OutputMultiplexer     │
//! │                                 ├─ video_color/depth│
//! │                                 ├─ frame_*.png      │
//! │                                 └─ screenshot_*.png │
//! └───────────────────────────▲─────────────────────────┘
//!          latest pair        │ toggles, run flag
//! ┌───────────────────────────┴─── control thread ──────┐
//! │ PreviewSurface::render · poll_key ─▶ OutputToggles  │
//! └─────────────────────────────────────────────────────┘
//! ```

mod acquisition;
mod context;
mod control;
mod multiplexer;
mod session;
mod timestamp;

pub use acquisition::{AcquisitionLoop, StopReason};
pub use context::{
    CaptureContext, CaptureStatus, ControlAction, FrameSlot, OutputToggles, ToggleSnapshot,
};
pub use control::{ControlThread, HeadlessSurface, PreviewSurface, StatusLine, run_control_loop};
pub use multiplexer::{DispatchReport, DispatchStats, OutputMultiplexer, VideoOutputs};
pub use session::{CaptureSession, SessionOutcome};
pub use timestamp::TimestampClock;
