// SPDX-License-Identifier: GPL-3.0-only

//! Processing pipelines
//!
//! - [`capture`]: the acquisition loop, its outputs and the control thread

pub mod capture;
