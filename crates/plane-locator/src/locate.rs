//! End-to-end helpers over raw pixel buffers and point arrays.

use log::debug;
use plane_locator_anchor::{AnchorDetection, AnchorError, AnchorLocator, AnchorParams};
use plane_locator_core::{correspondences_from_arrays, ImageError, PixelBuffer, Status};
use plane_locator_paper::{ConfigError, DetectionConfig, PaperDetection, PaperDetector};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors that end a request before any detection result exists.
#[derive(thiserror::Error, Debug)]
pub enum LocateError {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("coordinate arrays differ in length")]
    MismatchedPoints,
    #[error(transparent)]
    Anchor(#[from] AnchorError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("encoded image is empty")]
    EmptyEncoded,
    #[cfg(feature = "image")]
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[cfg(feature = "image")]
    #[error("failed to decode scene image: {0}")]
    SceneDecode(#[source] image::ImageError),
}

impl From<&LocateError> for Status {
    fn from(e: &LocateError) -> Self {
        match e {
            LocateError::Image(_)
            | LocateError::MismatchedPoints
            | LocateError::Anchor(_)
            | LocateError::Config(_)
            | LocateError::EmptyEncoded => Status::InvalidInput,
            #[cfg(feature = "image")]
            LocateError::Decode(_) => Status::DecodeFailed,
            #[cfg(feature = "image")]
            LocateError::SceneDecode(_) => Status::SceneDecodeFailed,
        }
    }
}

/// Defaults of the single-image pipeline (A4, tolerance 0.3, no pose).
pub fn default_paper_config() -> DetectionConfig {
    DetectionConfig::default()
}

pub(crate) fn anchor_or_failure(r: Result<AnchorDetection, LocateError>) -> AnchorDetection {
    r.unwrap_or_else(|e| {
        debug!("anchor request rejected: {e}");
        AnchorDetection::empty(Status::from(&e))
    })
}

pub(crate) fn paper_or_failure(r: Result<PaperDetection, LocateError>) -> PaperDetection {
    r.unwrap_or_else(|e| {
        debug!("paper request rejected: {e}");
        PaperDetection::empty(Status::from(&e))
    })
}

/// Locate `reference` inside `scene`, both given as raw interleaved pixels.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
pub fn locate_anchor_raw(
    reference: &PixelBuffer<'_>,
    scene: &PixelBuffer<'_>,
    params: &AnchorParams,
) -> AnchorDetection {
    anchor_or_failure(try_locate_anchor_raw(reference, scene, params))
}

fn try_locate_anchor_raw(
    reference: &PixelBuffer<'_>,
    scene: &PixelBuffer<'_>,
    params: &AnchorParams,
) -> Result<AnchorDetection, LocateError> {
    let reference = reference.to_gray()?;
    let scene = scene.to_gray()?;
    Ok(AnchorLocator::new(params.clone()).locate(&reference.view(), &scene.view()))
}

/// Fit from parallel coordinate arrays; `ref_width x ref_height` is the
/// reference rectangle whose corners are reported.
pub fn locate_anchor_from_points(
    ref_x: &[f32],
    ref_y: &[f32],
    scene_x: &[f32],
    scene_y: &[f32],
    ref_width: f32,
    ref_height: f32,
    params: &AnchorParams,
) -> AnchorDetection {
    anchor_or_failure(
        correspondences_from_arrays(ref_x, ref_y, scene_x, scene_y)
            .ok_or(LocateError::MismatchedPoints)
            .and_then(|corrs| {
                Ok(AnchorLocator::new(params.clone()).locate_from_correspondences(
                    &corrs, ref_width, ref_height,
                )?)
            }),
    )
}

/// Find a paper sheet in a raw pixel buffer. `None` uses
/// [`default_paper_config`].
#[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
pub fn detect_paper_raw(image: &PixelBuffer<'_>, config: Option<&DetectionConfig>) -> PaperDetection {
    paper_or_failure(try_detect_paper_raw(image, config))
}

fn try_detect_paper_raw(
    image: &PixelBuffer<'_>,
    config: Option<&DetectionConfig>,
) -> Result<PaperDetection, LocateError> {
    let detector = PaperDetector::new(config.cloned().unwrap_or_default())?;
    let gray = image.to_gray()?;
    Ok(detector.detect(&gray.view()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_stable_statuses() {
        assert_eq!(
            Status::from(&LocateError::MismatchedPoints),
            Status::InvalidInput
        );
        assert_eq!(
            Status::from(&LocateError::Image(ImageError::EmptyBuffer)),
            Status::InvalidInput
        );
        assert_eq!(
            Status::from(&LocateError::Config(ConfigError::EvenBlurKernel(2))),
            Status::InvalidInput
        );
    }

    #[test]
    fn ragged_point_arrays_are_invalid_input() {
        let d = locate_anchor_from_points(
            &[0.0; 5],
            &[0.0; 5],
            &[0.0; 4],
            &[0.0; 5],
            100.0,
            100.0,
            &AnchorParams::default(),
        );
        assert_eq!(d.status, Status::InvalidInput);
        assert_eq!(d.homography, plane_locator_core::Homography::zero());
    }
}
