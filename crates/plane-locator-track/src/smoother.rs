use log::trace;
use nalgebra::Point2;
use plane_locator_core::TrackedDetection;
use serde::{Deserialize, Serialize};

use crate::weight::adaptive_weight;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SmootherError {
    #[error("threshold must be finite and positive, got {0}")]
    Threshold(f32),
    #[error("smoothing factor must lie in (0, 1), got {0}")]
    SmoothingFactor(f32),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherParams {
    /// Mean corner displacement (pixels) below which a frame is ignored.
    pub threshold: f32,
    /// Base share of the previous smoothed corners kept when blending.
    pub smoothing_factor: f32,
}

impl Default for SmootherParams {
    fn default() -> Self {
        Self {
            threshold: 2.0,
            smoothing_factor: 0.7,
        }
    }
}

impl SmootherParams {
    pub fn validate(&self) -> Result<(), SmootherError> {
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(SmootherError::Threshold(self.threshold));
        }
        if !(self.smoothing_factor > 0.0 && self.smoothing_factor < 1.0) {
            return Err(SmootherError::SmoothingFactor(self.smoothing_factor));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub enum SmoothingState<T> {
    #[default]
    Empty,
    Tracking { corners: Vec<Point2<f32>>, result: T },
}

/// Stateful filter over one stream of detections.
///
/// Owned by a single stream; share across threads only behind a lock.
#[derive(Clone, Debug)]
pub struct CornerSmoother<T> {
    params: SmootherParams,
    state: SmoothingState<T>,
}

impl<T: TrackedDetection> CornerSmoother<T> {
    pub fn new(params: SmootherParams) -> Result<Self, SmootherError> {
        params.validate()?;
        Ok(Self {
            params,
            state: SmoothingState::Empty,
        })
    }

    pub fn params(&self) -> &SmootherParams {
        &self.params
    }

    pub fn state(&self) -> &SmoothingState<T> {
        &self.state
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, SmoothingState::Tracking { .. })
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.state = SmoothingState::Empty;
    }

    /// Feed one frame's detection and get the stabilized detection back.
    pub fn update(&mut self, detection: T) -> T {
        if !detection.is_valid() {
            if self.is_tracking() {
                trace!("smoother: invalid frame, reset");
            }
            self.state = SmoothingState::Empty;
            return detection;
        }

        let SmoothingState::Tracking { corners, result } = &self.state else {
            return self.store(detection.corners().to_vec(), detection);
        };

        if corners.len() != detection.corners().len() {
            trace!(
                "smoother: corner count {} -> {}, restart",
                corners.len(),
                detection.corners().len()
            );
            return self.store(detection.corners().to_vec(), detection);
        }

        let displacement = mean_displacement(corners, detection.corners());
        if displacement < self.params.threshold {
            return result.clone();
        }

        let w = adaptive_weight(
            displacement,
            self.params.threshold,
            self.params.smoothing_factor,
        );
        trace!("smoother: displacement {displacement:.2}px, weight {w:.3}");
        let smoothed: Vec<Point2<f32>> = corners
            .iter()
            .zip(detection.corners())
            .map(|(old, new)| Point2::from(new.coords * (1.0 - w) + old.coords * w))
            .collect();
        let center = mean(&smoothed);
        let blended = detection.with_corners(&smoothed, center);
        self.store(smoothed, blended)
    }

    fn store(&mut self, corners: Vec<Point2<f32>>, result: T) -> T {
        self.state = SmoothingState::Tracking {
            corners,
            result: result.clone(),
        };
        result
    }
}

/// Mean Euclidean distance between paired corners; infinite when there are none.
fn mean_displacement(old: &[Point2<f32>], new: &[Point2<f32>]) -> f32 {
    if old.len() != new.len() || old.is_empty() {
        return f32::INFINITY;
    }
    old.iter().zip(new).map(|(a, b)| (b - a).norm()).sum::<f32>() / old.len() as f32
}

fn mean(points: &[Point2<f32>]) -> Point2<f32> {
    let sum = points
        .iter()
        .fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords);
    Point2::from(sum / points.len().max(1) as f32)
}
