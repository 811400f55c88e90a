//! Edge/contour search for the best document-like quadrilateral.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::morphology::dilate;
use imageproc::point::Point;
use log::{debug, trace};
use nalgebra::{Point2, Vector2};
use plane_locator_core::{GrayImageView, Quad};
use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::{ConfigError, DetectionConfig};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContourError {
    #[error("image buffer does not match {width}x{height}")]
    InvalidImage { width: usize, height: usize },
    #[error("no external contours found")]
    NoContours,
    #[error("none of {contours} contours yielded an acceptable quadrilateral")]
    NoCandidate { contours: usize },
}

/// A quadrilateral that passed every filter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct QuadCandidate {
    /// Corners clockwise from the top-left.
    pub quad: Quad,
    /// Area enclosed by the source contour.
    pub area: f32,
    pub aspect_ratio: f32,
    /// `area * aspect_score`.
    pub score: f32,
}

#[derive(Clone, Debug)]
pub struct ContourQuadDetector {
    config: DetectionConfig,
}

impl ContourQuadDetector {
    pub fn new(config: DetectionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Highest-scoring candidate; the first one seen wins ties.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, img), fields(width = img.width, height = img.height))
    )]
    pub fn detect(&self, img: &GrayImageView<'_>) -> Result<QuadCandidate, ContourError> {
        let (candidates, contours) = self.scan(img)?;
        if contours == 0 {
            return Err(ContourError::NoContours);
        }
        let mut best: Option<QuadCandidate> = None;
        for c in candidates {
            if best.as_ref().is_none_or(|b| c.score > b.score) {
                best = Some(c);
            }
        }
        let best = best.ok_or(ContourError::NoCandidate { contours })?;
        debug!(
            "paper quad: area {:.0}, aspect {:.3}, score {:.0}",
            best.area, best.aspect_ratio, best.score
        );
        Ok(best)
    }

    /// Every surviving candidate, in contour order.
    pub fn candidates(&self, img: &GrayImageView<'_>) -> Result<Vec<QuadCandidate>, ContourError> {
        Ok(self.scan(img)?.0)
    }

    fn scan(&self, img: &GrayImageView<'_>) -> Result<(Vec<QuadCandidate>, usize), ContourError> {
        let edges = self.edge_map(img)?;
        let contours: Vec<Vec<Point<i32>>> = find_contours::<i32>(&edges)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| c.points)
            .collect();
        trace!("{} external contours", contours.len());

        let image_area = (img.width * img.height) as f32;
        let min_edge = img.width.min(img.height) as f32 * self.config.min_edge_ratio;
        let candidates = contours
            .iter()
            .filter_map(|c| self.evaluate(c, image_area, min_edge))
            .collect();
        Ok((candidates, contours.len()))
    }

    fn edge_map(&self, img: &GrayImageView<'_>) -> Result<GrayImage, ContourError> {
        let invalid = || ContourError::InvalidImage {
            width: img.width,
            height: img.height,
        };
        let w = u32::try_from(img.width).map_err(|_| invalid())?;
        let h = u32::try_from(img.height).map_err(|_| invalid())?;
        let data = img.data.get(..img.width * img.height).ok_or_else(invalid)?;
        let gray = GrayImage::from_raw(w, h, data.to_vec()).ok_or_else(invalid)?;

        let smoothed = match self.config.blur_sigma() {
            Some(sigma) => gaussian_blur_f32(&gray, sigma),
            None => gray,
        };
        let edges = canny(&smoothed, self.config.canny_low, self.config.canny_high);
        Ok(dilate(&edges, Norm::LInf, 1))
    }

    fn evaluate(&self, contour: &[Point<i32>], image_area: f32, min_edge: f32) -> Option<QuadCandidate> {
        let area = contour_area(contour);
        if area < image_area * self.config.min_area_ratio
            || area > image_area * self.config.max_area_ratio
        {
            return None;
        }

        let epsilon = self.config.approx_epsilon_ratio as f64 * arc_length(contour, true);
        let vertices = approximate_closed(contour, epsilon);
        let Ok(vertices) = <[usize; 4]>::try_from(vertices) else {
            return None;
        };
        let quad = Quad::ordered(refine_corners(contour, vertices));
        if !quad.is_convex() {
            trace!("reject non-convex {:?}", quad.corners);
            return None;
        }
        if quad.min_edge_length() < min_edge {
            return None;
        }

        let aspect_ratio = quad.aspect_ratio();
        let aspect = self.config.aspect();
        if aspect.check(aspect_ratio).is_err() {
            trace!("reject aspect {aspect_ratio:.3}");
            return None;
        }
        Some(QuadCandidate {
            quad,
            area,
            aspect_ratio,
            score: area * aspect.score(aspect_ratio),
        })
    }
}

/// Douglas-Peucker on a closed contour, returning vertex indices in
/// contour order.
///
/// The curve is cut at an approximate diameter pair first so that both
/// halves are open arcs between two true hull vertices, whatever point
/// the contour tracer happened to start from.
fn approximate_closed(contour: &[Point<i32>], epsilon: f64) -> Vec<usize> {
    let n = contour.len();
    if n < 3 || epsilon.is_nan() || epsilon <= 0.0 {
        return (0..n).collect();
    }
    let (a, b) = diameter_pair(contour);
    let (a, b) = (a.min(b), a.max(b));
    let forward: Vec<usize> = (a..=b).collect();
    let backward: Vec<usize> = (b..n).chain(0..=a).collect();

    let mut out = Vec::new();
    for arc in [forward, backward] {
        let points: Vec<Point<i32>> = arc.iter().map(|&i| contour[i]).collect();
        let kept = approximate_polygon_dp(&points, epsilon, false);
        // Map kept points back to indices; the arc end opens the next arc.
        let mut cursor = 0;
        for p in &kept[..kept.len().saturating_sub(1)] {
            if let Some(off) = points[cursor..].iter().position(|q| q == p) {
                cursor += off;
                out.push(arc[cursor]);
            }
        }
    }
    out
}

/// Farthest-point iteration from the first point; converges on a pair of
/// hull vertices spanning (nearly) the diameter.
fn diameter_pair(contour: &[Point<i32>]) -> (usize, usize) {
    let farthest = |from: usize| {
        let o = contour[from];
        contour
            .iter()
            .enumerate()
            .max_by_key(|(_, p)| {
                let (dx, dy) = ((p.x - o.x) as i64, (p.y - o.y) as i64);
                dx * dx + dy * dy
            })
            .map_or(from, |(i, _)| i)
    };
    let mut a = 0;
    let mut b = farthest(a);
    for _ in 0..3 {
        let next = farthest(b);
        if next == a {
            break;
        }
        a = b;
        b = next;
    }
    (a, b)
}

/// Corner positions from the four polygon vertices.
///
/// Each side is re-fit as a total-least-squares line through the middle of
/// its contour run and adjacent lines are intersected. A vertex keeps its
/// pixel position when a run is too short or the intersection wanders off.
fn refine_corners(contour: &[Point<i32>], v: [usize; 4]) -> [Point2<f32>; 4] {
    let raw = v.map(|i| Point2::new(contour[i].x as f32, contour[i].y as f32));
    let lines: Vec<Option<Line>> = (0..4)
        .map(|k| fit_line(contour, v[k], v[(k + 1) % 4]))
        .collect();

    let mut out = raw;
    for k in 0..4 {
        let (Some(before), Some(after)) = (&lines[(k + 3) % 4], &lines[k]) else {
            continue;
        };
        if let Some(p) = before.intersect(after) {
            if (p - raw[k]).norm() <= CORNER_SNAP_PX {
                out[k] = p;
            }
        }
    }
    out
}

/// Largest move from a polygon vertex to its refined corner.
const CORNER_SNAP_PX: f32 = 6.0;

struct Line {
    point: Point2<f32>,
    dir: Vector2<f32>,
}

impl Line {
    fn intersect(&self, other: &Line) -> Option<Point2<f32>> {
        let denom = self.dir.perp(&other.dir);
        if denom.abs() < 1e-3 {
            return None;
        }
        let t = (other.point - self.point).perp(&other.dir) / denom;
        let p = self.point + self.dir * t;
        (p.x.is_finite() && p.y.is_finite()).then_some(p)
    }
}

/// Fit a line to the contour run from index `from` to `to` (cyclic),
/// ignoring a fifth of the run at each end.
fn fit_line(contour: &[Point<i32>], from: usize, to: usize) -> Option<Line> {
    let n = contour.len();
    let len = (to + n - from) % n;
    let trim = len / 5;
    if len < trim * 2 + 3 {
        return None;
    }
    let run: Vec<Point2<f32>> = (from + trim..=from + len - trim)
        .map(|i| {
            let p = contour[i % n];
            Point2::new(p.x as f32, p.y as f32)
        })
        .collect();

    let m = run.len() as f32;
    let c = run.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords) / m;
    let (mut sxx, mut sxy, mut syy) = (0.0f32, 0.0f32, 0.0f32);
    for p in &run {
        let d = p.coords - c;
        sxx += d.x * d.x;
        sxy += d.x * d.y;
        syy += d.y * d.y;
    }
    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    Some(Line {
        point: Point2::from(c),
        dir: Vector2::new(theta.cos(), theta.sin()),
    })
}

/// Shoelace area of a closed pixel contour.
fn contour_area(points: &[Point<i32>]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p, q)| p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64)
        .sum();
    twice.unsigned_abs() as f32 * 0.5
}
