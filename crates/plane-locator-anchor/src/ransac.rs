//! Random-sample consensus for planar homographies.
//!
//! Provides:
//! - minimal 4-point hypotheses from a seedable or injected random source,
//! - inlier scoring by forward transfer error,
//! - a least-squares refit over the best consensus set.

use log::{debug, trace};
use nalgebra::Point2;
use plane_locator_core::{estimate_homography_dlt, homography_from_4pt, Correspondence, Homography};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

const SAMPLE_SIZE: usize = 4;
const COLLINEAR_EPS: f64 = 1e-6;

/// RANSAC configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Inlier threshold on the transfer error, in scene pixels.
    pub reproj_threshold: f64,
    /// Number of hypotheses drawn. Never exceeded.
    pub max_iters: usize,
    /// Seed for [`RobustHomographyEstimator::estimate`].
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            reproj_threshold: 5.0,
            max_iters: 2000,
            seed: 0,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RansacError {
    #[error("need at least {SAMPLE_SIZE} correspondences, got {got}")]
    TooFewCorrespondences { got: usize },
    #[error("no non-degenerate hypothesis found")]
    NoConsensus,
}

/// Best model with its consensus set.
#[derive(Clone, Debug)]
pub struct RansacHomography {
    pub homography: Homography,
    /// One flag per input correspondence.
    pub inlier_mask: Vec<bool>,
    pub inliers: usize,
}

#[derive(Clone, Debug, Default)]
pub struct RobustHomographyEstimator {
    params: RansacParams,
}

impl RobustHomographyEstimator {
    pub fn new(params: RansacParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RansacParams {
        &self.params
    }

    /// Fit with a `StdRng` seeded from [`RansacParams::seed`].
    pub fn estimate(&self, corrs: &[Correspondence]) -> Result<RansacHomography, RansacError> {
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        self.estimate_with_rng(corrs, &mut rng)
    }

    /// Fit drawing samples from `rng`.
    ///
    /// The best hypothesis is the one with strictly more inliers than all
    /// earlier ones, so ties keep the first seen. Sampling stops early only
    /// once every correspondence is an inlier.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, corrs, rng), fields(n = corrs.len()))
    )]
    pub fn estimate_with_rng<R: Rng + ?Sized>(
        &self,
        corrs: &[Correspondence],
        rng: &mut R,
    ) -> Result<RansacHomography, RansacError> {
        let n = corrs.len();
        if n < SAMPLE_SIZE {
            return Err(RansacError::TooFewCorrespondences { got: n });
        }

        let mut best: Option<(Homography, Vec<bool>, usize)> = None;
        let mut degenerate = 0usize;

        for iter in 0..self.params.max_iters {
            let picked = index::sample(rng, n, SAMPLE_SIZE);
            let sample: [Correspondence; SAMPLE_SIZE] = std::array::from_fn(|k| corrs[picked.index(k)]);
            let src = sample.map(|c| c.reference);
            let dst = sample.map(|c| c.scene);
            if has_collinear_triple(&src) || has_collinear_triple(&dst) {
                degenerate += 1;
                continue;
            }
            let Some(h) = homography_from_4pt(&src, &dst) else {
                degenerate += 1;
                continue;
            };

            let (mask, count) = self.score(&h, corrs);
            if best.as_ref().is_none_or(|(_, _, c)| count > *c) {
                trace!("iter {iter}: new best with {count}/{n} inliers");
                best = Some((h, mask, count));
                if count == n {
                    break;
                }
            }
        }

        let Some((h, mask, count)) = best else {
            debug!("ransac: all {} samples degenerate", self.params.max_iters);
            return Err(RansacError::NoConsensus);
        };

        let (homography, inlier_mask, inliers) = self.refit(corrs, h, mask, count);
        debug!(
            "ransac: {inliers}/{n} inliers ({degenerate} degenerate samples skipped)"
        );
        Ok(RansacHomography {
            homography,
            inlier_mask,
            inliers,
        })
    }

    fn score(&self, h: &Homography, corrs: &[Correspondence]) -> (Vec<bool>, usize) {
        let mask: Vec<bool> = corrs
            .iter()
            .map(|c| h.transfer_error(c.reference, c.scene) < self.params.reproj_threshold)
            .collect();
        let count = mask.iter().filter(|&&m| m).count();
        (mask, count)
    }

    /// Least-squares refit over the consensus set, kept unless it loses inliers.
    fn refit(
        &self,
        corrs: &[Correspondence],
        h: Homography,
        mask: Vec<bool>,
        count: usize,
    ) -> (Homography, Vec<bool>, usize) {
        if count < SAMPLE_SIZE {
            return (h, mask, count);
        }
        let (src, dst): (Vec<Point2<f32>>, Vec<Point2<f32>>) = corrs
            .iter()
            .zip(&mask)
            .filter(|(_, m)| **m)
            .map(|(c, _)| (c.reference, c.scene))
            .unzip();
        match estimate_homography_dlt(&src, &dst).filter(Homography::is_finite) {
            Some(refined) => {
                let (refined_mask, refined_count) = self.score(&refined, corrs);
                if refined_count >= count {
                    (refined, refined_mask, refined_count)
                } else {
                    (h, mask, count)
                }
            }
            None => (h, mask, count),
        }
    }
}

fn has_collinear_triple(pts: &[Point2<f32>; 4]) -> bool {
    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    TRIPLES.iter().any(|&[a, b, c]| {
        let (o, p, q) = (pts[a].cast::<f64>(), pts[b].cast::<f64>(), pts[c].cast::<f64>());
        let cross = (p.x - o.x) * (q.y - o.y) - (p.y - o.y) * (q.x - o.x);
        cross.abs() < COLLINEAR_EPS
    })
}
