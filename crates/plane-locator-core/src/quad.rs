//! Quadrilateral geometry and plausibility checks shared by both pipelines.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Four ordered corners.
///
/// Canonical order is clockwise (in image coordinates, y down) starting at
/// the corner nearest the top-left: TL, TR, BR, BL.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub corners: [Point2<f32>; 4],
}

/// Reasons a candidate quadrilateral is rejected.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum QuadRejection {
    #[error("quadrilateral is not convex")]
    NonConvex,
    #[error("aspect ratio {detected:.3} deviates from expected {expected:.3} by more than {tolerance:.3}")]
    AspectMismatch {
        detected: f32,
        expected: f32,
        tolerance: f32,
    },
    #[error("aspect distortion {distortion:.3} outside [{min:.2}, {max:.2}]")]
    Distorted { distortion: f32, min: f32, max: f32 },
    #[error("degenerate edge (length {length:.2})")]
    DegenerateEdge { length: f32 },
}

impl Quad {
    pub fn new(corners: [Point2<f32>; 4]) -> Self {
        Self { corners }
    }

    /// Build a quad reordered clockwise from the top-left.
    pub fn ordered(pts: [Point2<f32>; 4]) -> Self {
        Self::new(order_points_clockwise(pts))
    }

    pub fn zero() -> Self {
        Self::new([Point2::origin(); 4])
    }

    /// Axis-aligned rectangle `(0,0) .. (w,h)` in canonical order.
    pub fn rect(width: f32, height: f32) -> Self {
        Self::new([
            Point2::new(0.0, 0.0),
            Point2::new(width, 0.0),
            Point2::new(width, height),
            Point2::new(0.0, height),
        ])
    }

    /// Signed cross products `(b - a) x (c - a)` at each vertex.
    pub fn vertex_turns(&self) -> [f32; 4] {
        let c = &self.corners;
        std::array::from_fn(|i| cross(c[i], c[(i + 1) % 4], c[(i + 2) % 4]))
    }

    /// True when all four turns share one strict sign (either winding).
    pub fn is_convex(&self) -> bool {
        let t = self.vertex_turns();
        t.iter().all(|&v| v > 0.0) || t.iter().all(|&v| v < 0.0)
    }

    /// Edge lengths: top, right, bottom, left.
    pub fn edge_lengths(&self) -> [f32; 4] {
        let c = &self.corners;
        std::array::from_fn(|i| (c[(i + 1) % 4] - c[i]).norm())
    }

    pub fn perimeter(&self) -> f32 {
        self.edge_lengths().iter().sum()
    }

    pub fn center(&self) -> Point2<f32> {
        let s = self
            .corners
            .iter()
            .fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords);
        Point2::from(s / 4.0)
    }

    /// Absolute polygon area (shoelace).
    pub fn area(&self) -> f32 {
        let c = &self.corners;
        let twice: f32 = (0..4)
            .map(|i| {
                let j = (i + 1) % 4;
                c[i].x * c[j].y - c[j].x * c[i].y
            })
            .sum();
        twice.abs() * 0.5
    }

    /// Mean horizontal and mean vertical edge lengths `(width, height)`.
    pub fn mean_extents(&self) -> (f32, f32) {
        let [top, right, bottom, left] = self.edge_lengths();
        ((top + bottom) * 0.5, (left + right) * 0.5)
    }

    /// Orientation-free aspect ratio `min(w, h) / max(w, h)` in `[0, 1]`.
    pub fn aspect_ratio(&self) -> f32 {
        let (w, h) = self.mean_extents();
        let hi = w.max(h);
        if hi <= 0.0 {
            return 0.0;
        }
        w.min(h) / hi
    }

    pub fn min_edge_length(&self) -> f32 {
        self.edge_lengths()
            .iter()
            .copied()
            .fold(f32::INFINITY, f32::min)
    }

    pub fn is_finite(&self) -> bool {
        self.corners
            .iter()
            .all(|p| p.x.is_finite() && p.y.is_finite())
    }

    /// Row-major `[x0, y0, x1, y1, x2, y2, x3, y3]`.
    pub fn to_flat(&self) -> [f32; 8] {
        let c = &self.corners;
        [
            c[0].x, c[0].y, c[1].x, c[1].y, c[2].x, c[2].y, c[3].x, c[3].y,
        ]
    }

    pub fn ensure_convex(&self) -> Result<(), QuadRejection> {
        if self.is_convex() {
            Ok(())
        } else {
            Err(QuadRejection::NonConvex)
        }
    }
}

#[inline]
fn cross(o: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Reorder four points as TL, TR, BR, BL using the sum/difference heuristic.
///
/// TL has the smallest `x + y`, BR the largest; TR has the smallest `y - x`,
/// BL the largest. Ties resolve to the first point in input order. The
/// heuristic can assign one point twice for strongly rotated shapes; such
/// outputs fail the convexity test downstream.
pub fn order_points_clockwise(pts: [Point2<f32>; 4]) -> [Point2<f32>; 4] {
    let sums = pts.map(|p| p.x + p.y);
    let diffs = pts.map(|p| p.y - p.x);
    [
        pts[argmin(&sums)],
        pts[argmin(&diffs)],
        pts[argmax(&sums)],
        pts[argmax(&diffs)],
    ]
}

fn argmin(v: &[f32; 4]) -> usize {
    (1..4).fold(0, |best, i| if v[i] < v[best] { i } else { best })
}

fn argmax(v: &[f32; 4]) -> usize {
    (1..4).fold(0, |best, i| if v[i] > v[best] { i } else { best })
}

/// Expected `min/max` aspect ratio with a relative tolerance.
///
/// `expected <= 0` disables the check.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AspectConstraint {
    pub expected: f32,
    pub tolerance: f32,
}

impl AspectConstraint {
    pub const UNCONSTRAINED: AspectConstraint = AspectConstraint {
        expected: 0.0,
        tolerance: 0.3,
    };

    pub fn new(expected: f32, tolerance: f32) -> Self {
        Self {
            expected,
            tolerance,
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.expected > 0.0
    }

    /// Relative deviation `|aspect - expected| / expected`, `None` if disabled.
    pub fn deviation(&self, aspect: f32) -> Option<f32> {
        self.is_enabled()
            .then(|| (aspect - self.expected).abs() / self.expected)
    }

    pub fn check(&self, aspect: f32) -> Result<(), QuadRejection> {
        match self.deviation(aspect) {
            Some(d) if d > self.tolerance => Err(QuadRejection::AspectMismatch {
                detected: aspect,
                expected: self.expected,
                tolerance: self.tolerance,
            }),
            _ => Ok(()),
        }
    }

    /// `1 - deviation`, or 1 when no target ratio is configured.
    pub fn score(&self, aspect: f32) -> f32 {
        self.deviation(aspect).map_or(1.0, |d| 1.0 - d)
    }
}

impl Default for AspectConstraint {
    fn default() -> Self {
        Self::UNCONSTRAINED
    }
}

/// Multiplicative bounds on `(top / left) / (ref_w / ref_h)`.
///
/// Used by the feature pipeline to reject homographies that stretch the
/// reference beyond plausibility. Independent of [`AspectConstraint`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistortionBounds {
    pub min: f32,
    pub max: f32,
}

impl Default for DistortionBounds {
    fn default() -> Self {
        Self { min: 0.3, max: 3.0 }
    }
}

impl DistortionBounds {
    /// Check the scene quad `quad` (in reference corner order) against a
    /// `ref_w x ref_h` reference rectangle.
    pub fn check(&self, quad: &Quad, ref_w: f32, ref_h: f32) -> Result<(), QuadRejection> {
        let [top, _, _, left] = quad.edge_lengths();
        if left <= 0.0 || ref_h <= 0.0 {
            return Err(QuadRejection::DegenerateEdge { length: left });
        }
        let distortion = (top / left) / (ref_w / ref_h);
        if !distortion.is_finite() || distortion < self.min || distortion > self.max {
            return Err(QuadRejection::Distorted {
                distortion,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}
