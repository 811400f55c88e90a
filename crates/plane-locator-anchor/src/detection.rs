use nalgebra::Point2;
use plane_locator_core::{Homography, Quad, QuadRejection, Status, TrackedDetection};
use plane_locator_features::MatchError;
use serde::Serialize;

use crate::ransac::RansacError;

/// Why a well-formed request produced no detection.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AnchorRejection {
    #[error(transparent)]
    Features(#[from] MatchError),
    #[error("too few good matches ({found} < {needed})")]
    TooFewMatches { found: usize, needed: usize },
    #[error(transparent)]
    Ransac(#[from] RansacError),
    #[error("insufficient inliers ({inliers} of {total})")]
    InsufficientInliers { inliers: usize, total: usize },
    #[error("mapped reference corners are not finite")]
    NonFinite,
    #[error(transparent)]
    Geometry(#[from] QuadRejection),
}

/// Result of locating a reference inside a scene.
///
/// Corners follow the reference rectangle order `(0,0), (w,0), (w,h), (0,h)`
/// mapped into the scene. When `status` is not [`Status::Found`] corners,
/// center, rotation, scale and homography are zero; `matches` and `inliers`
/// still report how far the pipeline got.
#[derive(Clone, Debug, Serialize)]
pub struct AnchorDetection {
    pub status: Status,
    pub corners: Quad,
    pub center: Point2<f32>,
    /// Angle of the top edge in radians (image axes, y down).
    pub rotation: f32,
    /// Mean of `top / ref_w` and `left / ref_h`.
    pub scale: f32,
    pub homography: Homography,
    /// Correspondences offered to the estimator.
    pub matches: usize,
    pub inliers: usize,
    #[serde(skip)]
    pub rejection: Option<AnchorRejection>,
}

impl AnchorDetection {
    pub fn empty(status: Status) -> Self {
        Self {
            status,
            corners: Quad::zero(),
            center: Point2::origin(),
            rotation: 0.0,
            scale: 0.0,
            homography: Homography::zero(),
            matches: 0,
            inliers: 0,
            rejection: None,
        }
    }

    pub(crate) fn rejected(rejection: AnchorRejection, matches: usize, inliers: usize) -> Self {
        Self {
            matches,
            inliers,
            rejection: Some(rejection),
            ..Self::empty(Status::NotFound)
        }
    }

    /// Derive the scene quad of a `ref_w x ref_h` reference under `h`.
    pub(crate) fn from_homography(
        h: Homography,
        ref_w: f32,
        ref_h: f32,
        matches: usize,
        inliers: usize,
    ) -> Self {
        let corners = Quad::new(Quad::rect(ref_w, ref_h).corners.map(|p| h.apply(p)));
        let [top, _, _, left] = corners.edge_lengths();
        let c = &corners.corners;
        Self {
            status: Status::Found,
            corners,
            center: corners.center(),
            rotation: (c[1].y - c[0].y).atan2(c[1].x - c[0].x),
            scale: (top / ref_w + left / ref_h) * 0.5,
            homography: h,
            matches,
            inliers,
            rejection: None,
        }
    }

    #[inline]
    pub fn is_found(&self) -> bool {
        self.status.is_found()
    }
}

impl TrackedDetection for AnchorDetection {
    fn is_valid(&self) -> bool {
        self.is_found()
    }

    fn corners(&self) -> &[Point2<f32>] {
        &self.corners.corners
    }

    fn with_corners(&self, corners: &[Point2<f32>], center: Point2<f32>) -> Self {
        let mut out = self.clone();
        for (dst, src) in out.corners.corners.iter_mut().zip(corners) {
            *dst = *src;
        }
        out.center = center;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn scaled_rotation_free_mapping() {
        let h = Homography::from_row_major([2.0, 0.0, 10.0, 0.0, 2.0, 20.0, 0.0, 0.0, 1.0]);
        let d = AnchorDetection::from_homography(h, 100.0, 50.0, 40, 30);
        assert_eq!(d.corners.corners[0], Point2::new(10.0, 20.0));
        assert_eq!(d.corners.corners[2], Point2::new(210.0, 120.0));
        assert_relative_eq!(d.center, Point2::new(110.0, 70.0));
        assert_relative_eq!(d.scale, 2.0);
        assert_relative_eq!(d.rotation, 0.0);
    }

    #[test]
    fn rejection_zeroes_geometry_but_keeps_counts() {
        let d = AnchorDetection::rejected(
            AnchorRejection::InsufficientInliers {
                inliers: 5,
                total: 40,
            },
            40,
            5,
        );
        assert_eq!(d.status, Status::NotFound);
        assert_eq!(d.matches, 40);
        assert_eq!(d.homography, Homography::zero());
        assert_eq!(d.corners, Quad::zero());
    }
}
