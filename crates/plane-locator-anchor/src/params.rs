use plane_locator_core::{AspectConstraint, DistortionBounds};
use plane_locator_features::{MatchParams, OrbParams};
use serde::{Deserialize, Serialize};

use crate::detection::AnchorRejection;
use crate::ransac::RansacParams;

/// Absorbs rounding in `ratio * total` so the relative floor stays inclusive.
const RATIO_SLACK: f64 = 1e-9;

/// When a fitted homography is trusted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptancePolicy {
    /// Ratio-test survivors required before fitting (image path only).
    pub min_matches: usize,
    pub min_inliers: usize,
    /// Fraction of all correspondences that must be inliers.
    pub min_inlier_ratio: f64,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self {
            min_matches: 10,
            min_inliers: 10,
            min_inlier_ratio: 0.3,
        }
    }
}

impl AcceptancePolicy {
    pub fn check_matches(&self, matches: usize) -> Result<(), AnchorRejection> {
        if matches < self.min_matches {
            return Err(AnchorRejection::TooFewMatches {
                found: matches,
                needed: self.min_matches,
            });
        }
        Ok(())
    }

    /// Both the absolute and the relative inlier floors must hold.
    ///
    /// The relative floor is inclusive: exactly `min_inlier_ratio * total`
    /// inliers pass.
    pub fn check_inliers(&self, inliers: usize, total: usize) -> Result<(), AnchorRejection> {
        let needed = self.min_inlier_ratio * total as f64;
        if inliers < self.min_inliers || (inliers as f64) < needed - RATIO_SLACK * needed.max(1.0) {
            return Err(AnchorRejection::InsufficientInliers { inliers, total });
        }
        Ok(())
    }
}

/// Parameters of [`crate::AnchorLocator`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorParams {
    pub orb: OrbParams,
    pub matching: MatchParams,
    pub ransac: RansacParams,
    pub acceptance: AcceptancePolicy,
    /// Bounds on `(top/left) / (ref_w/ref_h)` of the mapped reference.
    pub distortion: DistortionBounds,
    /// Optional `min/max` aspect test on the mapped reference. Off by default.
    pub aspect: AspectConstraint,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inlier_policy_needs_both_floors() {
        let p = AcceptancePolicy::default();
        assert!(p.check_inliers(10, 30).is_ok());
        assert!(p.check_inliers(9, 9).is_err());
        assert!(p.check_inliers(12, 50).is_err());
        assert!(p.check_inliers(15, 50).is_ok());
    }

    #[test]
    fn relative_floor_is_inclusive_at_exact_fractions() {
        let p = AcceptancePolicy {
            min_inliers: 0,
            ..AcceptancePolicy::default()
        };
        // 0.3 * 10 and 0.3 * 50 are not exact in binary floating point.
        assert!(p.check_inliers(3, 10).is_ok());
        assert!(p.check_inliers(2, 10).is_err());
        assert!(p.check_inliers(15, 50).is_ok());
        assert!(p.check_inliers(14, 50).is_err());
        assert!(p.check_inliers(300, 1000).is_ok());
        assert!(p.check_inliers(299, 1000).is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let p: AnchorParams =
            serde_json::from_str(r#"{ "ransac": { "seed": 7 }, "matching": { "ratio": 0.8 } }"#)
                .expect("parse");
        assert_eq!(p.ransac.seed, 7);
        assert_eq!(p.ransac.max_iters, 2000);
        assert_eq!(p.matching.ratio, 0.8);
        assert_eq!(p.acceptance, AcceptancePolicy::default());
        assert!(!p.aspect.is_enabled());
    }
}
