//! Single-image detection of a document-like quadrilateral.
//!
//! The detector blurs, extracts Canny edges, closes gaps by dilation and
//! walks the outer contours, keeping the best convex four-sided polygon that
//! fits the configured area and aspect constraints. When camera intrinsics
//! are configured, the pose of the sheet is recovered from its known
//! physical size.
//!
//! Configuration comes from [`DetectionConfig`], either built directly, taken
//! from a [`PaperPreset`] or loaded from JSON.

mod config;
mod contour;
mod detector;
mod pose;

pub use config::{ConfigError, DetectionConfig, PaperIoError, PaperPreset};
pub use contour::{ContourError, ContourQuadDetector, QuadCandidate};
pub use detector::{PaperDetection, PaperDetector};
pub use pose::{estimate_planar_pose, CameraIntrinsics, PlanarPose};
