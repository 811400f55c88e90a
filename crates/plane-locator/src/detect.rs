//! End-to-end helpers over encoded image bytes (PNG, JPEG, ...).

use plane_locator_anchor::{AnchorDetection, AnchorLocator, AnchorParams};
use plane_locator_core::GrayImageView;
use plane_locator_paper::{DetectionConfig, PaperDetection, PaperDetector};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::locate::{anchor_or_failure, paper_or_failure, LocateError};

/// Borrow an `image::GrayImage` as the core view type.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

fn decode(bytes: &[u8]) -> Result<::image::GrayImage, ::image::ImageError> {
    Ok(::image::load_from_memory(bytes)?.to_luma8())
}

/// Locate an encoded reference image inside an encoded scene.
///
/// Undecodable reference bytes report `DecodeFailed`, undecodable scene
/// bytes `SceneDecodeFailed`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(reference_len = reference.len(), scene_len = scene.len()))
)]
pub fn locate_anchor_encoded(reference: &[u8], scene: &[u8], params: &AnchorParams) -> AnchorDetection {
    anchor_or_failure(try_locate_anchor_encoded(reference, scene, params))
}

fn try_locate_anchor_encoded(
    reference: &[u8],
    scene: &[u8],
    params: &AnchorParams,
) -> Result<AnchorDetection, LocateError> {
    if reference.is_empty() || scene.is_empty() {
        return Err(LocateError::EmptyEncoded);
    }
    let reference = decode(reference).map_err(LocateError::Decode)?;
    let scene = decode(scene).map_err(LocateError::SceneDecode)?;
    Ok(locate_anchor_image(&reference, &scene, params))
}

/// Locate a decoded reference inside a decoded scene.
pub fn locate_anchor_image(
    reference: &::image::GrayImage,
    scene: &::image::GrayImage,
    params: &AnchorParams,
) -> AnchorDetection {
    AnchorLocator::new(params.clone()).locate(&gray_view(reference), &gray_view(scene))
}

/// Find a paper sheet in encoded image bytes.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(len = bytes.len()))
)]
pub fn detect_paper_encoded(bytes: &[u8], config: Option<&DetectionConfig>) -> PaperDetection {
    paper_or_failure(try_detect_paper_encoded(bytes, config))
}

fn try_detect_paper_encoded(
    bytes: &[u8],
    config: Option<&DetectionConfig>,
) -> Result<PaperDetection, LocateError> {
    if bytes.is_empty() {
        return Err(LocateError::EmptyEncoded);
    }
    let detector = PaperDetector::new(config.cloned().unwrap_or_default())?;
    let gray = decode(bytes).map_err(LocateError::Decode)?;
    Ok(detector.detect(&gray_view(&gray)))
}

/// Find a paper sheet in a decoded grayscale image.
pub fn detect_paper_image(
    img: &::image::GrayImage,
    config: &DetectionConfig,
) -> Result<PaperDetection, LocateError> {
    Ok(PaperDetector::new(config.clone())?.detect(&gray_view(img)))
}
