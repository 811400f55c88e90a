//! High-level facade crate for the `plane-locator-*` workspace.
//!
//! This crate provides:
//! - stable re-exports of the underlying crates,
//! - status-qualified end-to-end helpers over raw pixel buffers and point
//!   arrays ([`locate`]),
//! - (feature `image`) the same helpers over encoded image bytes ([`detect`]).
//!
//! Every helper returns a complete record. Failures are reported through
//! [`Status`], never by panicking:
//!
//! | status | code | when |
//! |---|---:|---|
//! | `Found` | 1 | object located and validated |
//! | `NotFound` | 0 | no texture, too few matches or inliers, no plausible quad |
//! | `InvalidInput` | -1 | malformed buffer, mismatched arrays, < 4 points, bad config |
//! | `DecodeFailed` | -2 | reference (or single) image bytes not decodable |
//! | `SceneDecodeFailed` | -3 | scene image bytes not decodable |
//!
//! ## Quickstart
//!
//! ```no_run
//! use plane_locator::locate;
//! use plane_locator::core::PixelBuffer;
//!
//! let rgb = vec![0u8; 640 * 480 * 3];
//! let frame = PixelBuffer::new(640, 480, 3, &rgb);
//! let sheet = locate::detect_paper_raw(&frame, None);
//! println!("status {}, corners {:?}", sheet.status.code(), sheet.corners.to_flat());
//! ```
//!
//! ## API map
//! - `plane_locator::core`: geometry, image and status types.
//! - `plane_locator::features`: keypoints, descriptors, ratio-test matching.
//! - `plane_locator::anchor`: RANSAC homography and reference localization.
//! - `plane_locator::paper`: contour quad search, presets, planar pose.
//! - `plane_locator::track`: temporal corner smoothing.

pub use plane_locator_anchor as anchor;
pub use plane_locator_core as core;
pub use plane_locator_features as features;
pub use plane_locator_paper as paper;
pub use plane_locator_track as track;

pub use plane_locator_anchor::{AnchorDetection, AnchorParams};
pub use plane_locator_core::{Homography, PixelBuffer, Quad, Status, TrackedDetection};
pub use plane_locator_paper::{DetectionConfig, PaperDetection, PaperPreset};
pub use plane_locator_track::{CornerSmoother, SmootherParams};

pub mod locate;

#[cfg(feature = "image")]
pub mod detect;

/// Library version string.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
