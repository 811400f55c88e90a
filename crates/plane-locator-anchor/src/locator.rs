use log::debug;
use plane_locator_core::{Correspondence, GrayImageView};
use plane_locator_features::FeatureMatcher;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::detection::{AnchorDetection, AnchorRejection};
use crate::params::AnchorParams;
use crate::ransac::RobustHomographyEstimator;

/// Malformed requests, as opposed to scenes that lack the reference.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AnchorError {
    #[error("at least 4 correspondences are required, got {got}")]
    TooFewCorrespondences { got: usize },
    #[error("invalid reference size {width}x{height}")]
    InvalidReferenceSize { width: f32, height: f32 },
}

/// Locates a reference image in a scene via features and a robust homography.
#[derive(Clone, Debug)]
pub struct AnchorLocator {
    params: AnchorParams,
    matcher: FeatureMatcher,
    estimator: RobustHomographyEstimator,
}

impl Default for AnchorLocator {
    fn default() -> Self {
        Self::new(AnchorParams::default())
    }
}

impl AnchorLocator {
    pub fn new(params: AnchorParams) -> Self {
        let matcher = FeatureMatcher::new(params.orb.clone(), params.matching);
        let estimator = RobustHomographyEstimator::new(params.ransac.clone());
        Self {
            params,
            matcher,
            estimator,
        }
    }

    pub fn params(&self) -> &AnchorParams {
        &self.params
    }

    /// Full pipeline from two grayscale images.
    ///
    /// Never fails: missing texture, too few matches or a rejected geometry
    /// all yield a `NotFound` detection carrying the reason.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, reference, scene), fields(
            ref_w = reference.width, ref_h = reference.height,
            scene_w = scene.width, scene_h = scene.height))
    )]
    pub fn locate(&self, reference: &GrayImageView<'_>, scene: &GrayImageView<'_>) -> AnchorDetection {
        let corrs = match self.matcher.match_images(reference, scene) {
            Ok(c) => c,
            Err(e) => {
                debug!("anchor: {e}");
                return AnchorDetection::rejected(e.into(), 0, 0);
            }
        };
        if let Err(e) = self.params.acceptance.check_matches(corrs.len()) {
            debug!("anchor: {e}");
            return AnchorDetection::rejected(e, corrs.len(), 0);
        }
        self.fit(&corrs, reference.width as f32, reference.height as f32)
    }

    /// Pipeline from caller-supplied correspondences.
    ///
    /// `ref_w x ref_h` is the reference rectangle whose corners are mapped.
    pub fn locate_from_correspondences(
        &self,
        corrs: &[Correspondence],
        ref_w: f32,
        ref_h: f32,
    ) -> Result<AnchorDetection, AnchorError> {
        if corrs.len() < 4 {
            return Err(AnchorError::TooFewCorrespondences { got: corrs.len() });
        }
        if !(ref_w > 0.0 && ref_h > 0.0) {
            return Err(AnchorError::InvalidReferenceSize {
                width: ref_w,
                height: ref_h,
            });
        }
        Ok(self.fit(corrs, ref_w, ref_h))
    }

    fn fit(&self, corrs: &[Correspondence], ref_w: f32, ref_h: f32) -> AnchorDetection {
        let n = corrs.len();
        let fit = match self.estimator.estimate(corrs) {
            Ok(fit) => fit,
            Err(e) => {
                debug!("anchor: {e}");
                return AnchorDetection::rejected(e.into(), n, 0);
            }
        };
        if let Err(e) = self.params.acceptance.check_inliers(fit.inliers, n) {
            debug!("anchor: {e}");
            return AnchorDetection::rejected(e, n, fit.inliers);
        }

        let detection = AnchorDetection::from_homography(fit.homography, ref_w, ref_h, n, fit.inliers);
        match self.validate(&detection, ref_w, ref_h) {
            Ok(()) => {
                debug!(
                    "anchor found: {}/{} inliers, scale {:.3}, rotation {:.3}",
                    fit.inliers, n, detection.scale, detection.rotation
                );
                detection
            }
            Err(e) => {
                debug!("anchor: {e}");
                AnchorDetection::rejected(e, n, fit.inliers)
            }
        }
    }

    fn validate(&self, d: &AnchorDetection, ref_w: f32, ref_h: f32) -> Result<(), AnchorRejection> {
        if !d.corners.is_finite() || !d.homography.is_finite() {
            return Err(AnchorRejection::NonFinite);
        }
        d.corners.ensure_convex()?;
        self.params.distortion.check(&d.corners, ref_w, ref_h)?;
        self.params.aspect.check(d.corners.aspect_ratio())?;
        Ok(())
    }
}
