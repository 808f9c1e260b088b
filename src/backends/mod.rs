// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for depth sensors
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Capture Pipeline              │
//! └────────────────────┬────────────────────────┘
//!                      │ SensorSource
//! ┌────────────────────┴────────────────────────┐
//! │              Sensor Backends                │
//! │  ┌─────────────┐    ┌──────────────────┐    │
//! │  │  freedepth  │    │    Synthetic     │    │
//! │  │  (Kinect)   │    │   (stub:// URIs) │    │
//! │  └─────────────┘    └──────────────────┘    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`sensor`]: Runtime, device and stream traits plus the paired source

pub mod sensor;
