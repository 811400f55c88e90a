use log::debug;
use nalgebra::Point2;
use plane_locator_core::{homography_from_4pt, GrayImageView, Homography, Quad, Status, TrackedDetection};
use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::{ConfigError, DetectionConfig};
use crate::contour::{ContourError, ContourQuadDetector, QuadCandidate};
use crate::pose::{estimate_planar_pose, PlanarPose};

/// Result of a single-image paper search.
///
/// `homography` maps the canonical `paper_w x paper_h` rectangle (swapped
/// for landscape detections) onto `corners`. Geometry is zeroed unless
/// `status` is [`Status::Found`].
#[derive(Clone, Debug, Serialize)]
pub struct PaperDetection {
    pub status: Status,
    pub corners: Quad,
    pub center: Point2<f32>,
    pub homography: Homography,
    /// Present only when intrinsics were configured and the solve succeeded.
    pub pose: Option<PlanarPose>,
    pub area: f32,
    pub perimeter: f32,
    pub aspect_ratio: f32,
    #[serde(skip)]
    pub rejection: Option<ContourError>,
}

impl PaperDetection {
    pub fn empty(status: Status) -> Self {
        Self {
            status,
            corners: Quad::zero(),
            center: Point2::origin(),
            homography: Homography::zero(),
            pose: None,
            area: 0.0,
            perimeter: 0.0,
            aspect_ratio: 0.0,
            rejection: None,
        }
    }

    #[inline]
    pub fn is_found(&self) -> bool {
        self.status.is_found()
    }
}

impl TrackedDetection for PaperDetection {
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

/// Contour search plus the derived outputs: canonical homography and pose.
#[derive(Clone, Debug)]
pub struct PaperDetector {
    contour: ContourQuadDetector,
}

impl PaperDetector {
    pub fn new(config: DetectionConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            contour: ContourQuadDetector::new(config)?,
        })
    }

    pub fn config(&self) -> &DetectionConfig {
        self.contour.config()
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, img), fields(width = img.width, height = img.height))
    )]
    pub fn detect(&self, img: &GrayImageView<'_>) -> PaperDetection {
        match self.contour.detect(img) {
            Ok(candidate) => self.describe(candidate, img.width, img.height),
            Err(e) => {
                debug!("paper: {e}");
                PaperDetection {
                    rejection: Some(e),
                    ..PaperDetection::empty(Status::NotFound)
                }
            }
        }
    }

    fn describe(&self, candidate: QuadCandidate, width: usize, height: usize) -> PaperDetection {
        let config = self.config();
        let quad = candidate.quad;
        let (mean_w, mean_h) = quad.mean_extents();
        let (mut paper_w, mut paper_h) = config.physical_size();
        if mean_w > mean_h {
            std::mem::swap(&mut paper_w, &mut paper_h);
        }

        let homography = homography_from_4pt(&Quad::rect(paper_w, paper_h).corners, &quad.corners)
            .unwrap_or_else(Homography::zero);

        let pose = config.intrinsics().matrix(width, height).and_then(|k| {
            let pose = estimate_planar_pose(&quad, paper_w, paper_h, &k);
            if pose.is_none() {
                debug!("paper: pose solve failed");
            }
            pose
        });

        PaperDetection {
            status: Status::Found,
            corners: quad,
            center: quad.center(),
            homography,
            pose,
            area: candidate.area,
            perimeter: quad.perimeter(),
            aspect_ratio: candidate.aspect_ratio,
            rejection: None,
        }
    }
}
