// SPDX-License-Identifier: GPL-3.0-only

//! Media processing: frame normalization and output encoding
//!
//! # Normalization
//!
//! Raw sensor frames are copied into owned images by [`normalize`]: color is
//! reordered to the sinks' channel order, depth is scaled to 8-bit grayscale
//! and replicated into a 3-channel visualization.
//!
//! # Encoding
//!
//! The [`encoders`] module holds the sinks normalized frames are written to:
//! - **Video**: Motion-JPEG in AVI through a GStreamer `appsrc` pipeline
//! - **Images**: PNG files through the `image` crate

pub mod encoders;
pub mod normalize;

pub use normalize::{NormalizedPair, normalize_pair};
