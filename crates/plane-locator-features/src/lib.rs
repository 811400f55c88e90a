//! Binary feature extraction and matching.
//!
//! This crate covers the first stage of the reference/scene pipeline:
//! - ORB-style keypoints: FAST-9 corners on a scale pyramid, ranked by Harris
//!   response, oriented by intensity centroid,
//! - steered 256-bit BRIEF descriptors,
//! - brute-force Hamming matching with a nearest/second-nearest ratio test.
//!
//! It does **not** estimate any geometry; see `plane-locator-anchor` for
//! robust homography fitting on the produced correspondences.

mod brief;
mod feature_matcher;
mod keypoint;
mod matcher;
mod orb;

pub use brief::BriefPattern;
pub use feature_matcher::{FeatureMatcher, FeatureMatches, MatchError, MIN_KEYPOINTS};
pub use keypoint::{Descriptor, Features, Keypoint};
pub use matcher::{match_descriptors, DescriptorMatch, MatchParams};
pub use orb::{OrbDetector, OrbParams};
