//! Localization of a reference image inside a scene.
//!
//! Pipeline:
//! 1. match binary features between reference and scene
//!    (`plane-locator-features`), or take caller-supplied correspondences,
//! 2. fit a homography with seeded random-sample consensus,
//! 3. apply the acceptance policy (minimum inliers, inlier ratio),
//! 4. map the reference rectangle into the scene and validate the
//!    resulting quadrilateral (convexity, distortion bounds).
//!
//! ## Quickstart
//!
//! ```no_run
//! use plane_locator_anchor::{AnchorLocator, AnchorParams};
//! use plane_locator_core::GrayImageView;
//!
//! let reference = vec![0u8; 320 * 240];
//! let scene = vec![0u8; 640 * 480];
//! let reference = GrayImageView { width: 320, height: 240, data: &reference };
//! let scene = GrayImageView { width: 640, height: 480, data: &scene };
//!
//! let locator = AnchorLocator::new(AnchorParams::default());
//! let detection = locator.locate(&reference, &scene);
//! println!("status {:?}, {} inliers", detection.status, detection.inliers);
//! ```

mod detection;
mod locator;
mod params;
mod ransac;

pub use detection::{AnchorDetection, AnchorRejection};
pub use locator::{AnchorError, AnchorLocator};
pub use params::{AcceptancePolicy, AnchorParams};
pub use ransac::{RansacError, RansacHomography, RansacParams, RobustHomographyEstimator};
