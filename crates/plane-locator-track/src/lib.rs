//! Jitter suppression for per-frame quadrilateral detections.
//!
//! [`CornerSmoother`] owns the state of one detection stream. Small
//! displacements are ignored, real movements are blended with a weight from
//! [`adaptive_weight`] that favors stability for slow motion and
//! responsiveness for fast motion.

mod smoother;
mod weight;

pub use smoother::{CornerSmoother, SmootherError, SmootherParams, SmoothingState};
pub use weight::{adaptive_weight, MAX_WEIGHT, MIN_WEIGHT};
