use log::debug;
use plane_locator_core::{Correspondence, GrayImageView};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::keypoint::Features;
use crate::matcher::{match_descriptors, DescriptorMatch, MatchParams};
use crate::orb::{OrbDetector, OrbParams};

/// Minimum keypoints required on each side before matching is attempted.
pub const MIN_KEYPOINTS: usize = 4;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("too few keypoints (reference={reference}, scene={scene}, need {MIN_KEYPOINTS})")]
    TooFewKeypoints { reference: usize, scene: usize },
}

/// Everything the matcher produced for one image pair.
#[derive(Clone, Debug, Default)]
pub struct FeatureMatches {
    pub reference: Features,
    pub scene: Features,
    pub matches: Vec<DescriptorMatch>,
}

impl FeatureMatches {
    /// Matched keypoint positions, reference first.
    pub fn correspondences(&self) -> Vec<Correspondence> {
        self.matches
            .iter()
            .map(|m| {
                Correspondence::new(
                    self.reference.keypoints[m.query].position,
                    self.scene.keypoints[m.train].position,
                )
            })
            .collect()
    }
}

/// Extracts features from a reference and a scene image and pairs them.
#[derive(Clone, Debug, Default)]
pub struct FeatureMatcher {
    detector: OrbDetector,
    params: MatchParams,
}

impl FeatureMatcher {
    pub fn new(orb: OrbParams, params: MatchParams) -> Self {
        Self {
            detector: OrbDetector::new(orb),
            params,
        }
    }

    pub fn detector(&self) -> &OrbDetector {
        &self.detector
    }

    pub fn params(&self) -> &MatchParams {
        &self.params
    }

    /// Detect, describe and ratio-test match.
    ///
    /// Fails when either image has fewer than [`MIN_KEYPOINTS`] keypoints.
    /// An empty match list is a valid outcome.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, reference, scene), fields(
            ref_w = reference.width, ref_h = reference.height,
            scene_w = scene.width, scene_h = scene.height))
    )]
    pub fn match_features(
        &self,
        reference: &GrayImageView<'_>,
        scene: &GrayImageView<'_>,
    ) -> Result<FeatureMatches, MatchError> {
        let ref_features = self.detector.detect_and_compute(reference);
        let scene_features = self.detector.detect_and_compute(scene);
        if ref_features.len() < MIN_KEYPOINTS || scene_features.len() < MIN_KEYPOINTS {
            return Err(MatchError::TooFewKeypoints {
                reference: ref_features.len(),
                scene: scene_features.len(),
            });
        }

        let matches = match_descriptors(
            &ref_features.descriptors,
            &scene_features.descriptors,
            &self.params,
        );
        debug!(
            "matches: {} good of {} reference / {} scene keypoints",
            matches.len(),
            ref_features.len(),
            scene_features.len()
        );
        Ok(FeatureMatches {
            reference: ref_features,
            scene: scene_features,
            matches,
        })
    }

    /// Like [`FeatureMatcher::match_features`], returning only point pairs.
    pub fn match_images(
        &self,
        reference: &GrayImageView<'_>,
        scene: &GrayImageView<'_>,
    ) -> Result<Vec<Correspondence>, MatchError> {
        Ok(self.match_features(reference, scene)?.correspondences())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plane_locator_core::GrayImage;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn block_texture(w: usize, h: usize, seed: u64) -> GrayImage {
        let mut rng = StdRng::seed_from_u64(seed);
        let cell = 8;
        let cols = w.div_ceil(cell);
        let rows = h.div_ceil(cell);
        let levels: Vec<u8> = (0..cols * rows).map(|_| rng.gen_range(0..=255)).collect();
        let mut img = GrayImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                img.data[y * w + x] = levels[(y / cell) * cols + x / cell];
            }
        }
        img
    }

    fn shifted(src: &GrayImage, dx: usize, dy: usize) -> GrayImage {
        let mut out = GrayImage::new(src.width, src.height);
        for y in dy..src.height {
            for x in dx..src.width {
                out.data[y * src.width + x] = src.data[(y - dy) * src.width + (x - dx)];
            }
        }
        out
    }

    #[test]
    fn blank_images_fail_with_too_few_keypoints() {
        let blank = GrayImage::new(120, 120);
        let err = FeatureMatcher::default()
            .match_images(&blank.view(), &blank.view())
            .unwrap_err();
        assert_eq!(
            err,
            MatchError::TooFewKeypoints {
                reference: 0,
                scene: 0
            }
        );
    }

    #[test]
    fn translated_texture_matches_with_consistent_offset() {
        let reference = block_texture(240, 200, 7);
        let scene = shifted(&reference, 12, 8);
        let corrs = FeatureMatcher::default()
            .match_images(&reference.view(), &scene.view())
            .expect("textured images");
        assert!(corrs.len() >= 10, "only {} matches", corrs.len());

        let consistent = corrs
            .iter()
            .filter(|c| {
                let d = c.scene - c.reference;
                (d.x - 12.0).abs() <= 2.0 && (d.y - 8.0).abs() <= 2.0
            })
            .count();
        assert!(
            consistent * 2 >= corrs.len(),
            "{consistent} of {} matches agree with the shift",
            corrs.len()
        );
    }
}
