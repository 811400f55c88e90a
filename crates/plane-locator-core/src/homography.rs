use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Projective map `p_dst ~ H * p_src` between two planes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn zero() -> Self {
        Self {
            h: Matrix3::zeros(),
        }
    }

    pub fn from_row_major(m: [f64; 9]) -> Self {
        Self::new(Matrix3::from_row_slice(&m))
    }

    /// All nine entries in row-major order, without rescaling.
    pub fn to_row_major(&self) -> [f64; 9] {
        [
            self.h[(0, 0)],
            self.h[(0, 1)],
            self.h[(0, 2)],
            self.h[(1, 0)],
            self.h[(1, 1)],
            self.h[(1, 2)],
            self.h[(2, 0)],
            self.h[(2, 1)],
            self.h[(2, 2)],
        ]
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let q = self.apply_f64(Point2::new(p.x as f64, p.y as f64));
        Point2::new(q.x as f32, q.y as f32)
    }

    #[inline]
    pub fn apply_f64(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        Point2::new(v[0] / w, v[1] / w)
    }

    /// Euclidean distance between `H * src` and `dst`.
    ///
    /// Points mapped to infinity yield `f64::INFINITY`.
    #[inline]
    pub fn transfer_error(&self, src: Point2<f32>, dst: Point2<f32>) -> f64 {
        let v = self.h * Vector3::new(src.x as f64, src.y as f64, 1.0);
        if v[2].abs() < f64::EPSILON {
            return f64::INFINITY;
        }
        let dx = v[0] / v[2] - dst.x as f64;
        let dy = v[1] / v[2] - dst.y as f64;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    pub fn is_finite(&self) -> bool {
        self.h.iter().all(|v| v.is_finite())
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

/// Similarity that moves a point set to its centroid and scales it so the
/// mean distance from the origin is `sqrt(2)`.
struct Conditioning {
    scale: f64,
    cx: f64,
    cy: f64,
}

impl Conditioning {
    fn fit(pts: &[Point2<f32>]) -> Self {
        let n = pts.len() as f64;
        let centroid = pts
            .iter()
            .fold(Vector2::zeros(), |acc: Vector2<f64>, p| {
                acc + Vector2::new(p.x as f64, p.y as f64)
            })
            / n;
        let spread = pts
            .iter()
            .map(|p| (Vector2::new(p.x as f64, p.y as f64) - centroid).norm())
            .sum::<f64>()
            / n;
        let scale = if spread > 1e-12 {
            std::f64::consts::SQRT_2 / spread
        } else {
            1.0
        };
        Self {
            scale,
            cx: centroid.x,
            cy: centroid.y,
        }
    }

    fn map(&self, p: Point2<f32>) -> (f64, f64) {
        (
            (p.x as f64 - self.cx) * self.scale,
            (p.y as f64 - self.cy) * self.scale,
        )
    }

    fn forward(&self) -> Matrix3<f64> {
        let s = self.scale;
        Matrix3::new(s, 0.0, -s * self.cx, 0.0, s, -s * self.cy, 0.0, 0.0, 1.0)
    }

    fn backward(&self) -> Matrix3<f64> {
        let inv = 1.0 / self.scale;
        Matrix3::new(inv, 0.0, self.cx, 0.0, inv, self.cy, 0.0, 0.0, 1.0)
    }
}

/// The two linear constraints one correspondence `(x, y) -> (u, v)` places
/// on the nine entries of H.
fn constraint_rows((x, y): (f64, f64), (u, v): (f64, f64)) -> [[f64; 9]; 2] {
    [
        [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u],
        [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, -v],
    ]
}

/// Undo the conditioning on both sides and fix the scale so `H[2][2] == 1`.
fn finish(
    conditioned: Matrix3<f64>,
    src: &Conditioning,
    dst: &Conditioning,
) -> Option<Homography> {
    let h = dst.backward() * conditioned * src.forward();
    let w = h[(2, 2)];
    if w.abs() < 1e-12 {
        return None;
    }
    let out = Homography::new(h / w);
    out.is_finite().then_some(out)
}

/// Least-squares DLT estimate of H such that `dst ~ H * src`.
///
/// Exactly four correspondences are solved with [`homography_from_4pt`];
/// larger sets take the null vector of the conditioned constraint matrix.
pub fn estimate_homography_dlt(src: &[Point2<f32>], dst: &[Point2<f32>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }
    if let (Ok(s), Ok(d)) = (
        <&[Point2<f32>; 4]>::try_from(src),
        <&[Point2<f32>; 4]>::try_from(dst),
    ) {
        return homography_from_4pt(s, d);
    }

    let cs = Conditioning::fit(src);
    let cd = Conditioning::fit(dst);

    let mut a = DMatrix::<f64>::zeros(2 * src.len(), 9);
    for (k, (&s, &d)) in src.iter().zip(dst).enumerate() {
        for (offset, row) in constraint_rows(cs.map(s), cd.map(d)).iter().enumerate() {
            for (col, &value) in row.iter().enumerate() {
                a[(2 * k + offset, col)] = value;
            }
        }
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let smallest = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|l, r| l.1.total_cmp(r.1))
        .map(|(idx, _)| idx)?;
    let null = v_t.row(smallest);
    let conditioned = Matrix3::from_iterator(null.iter().copied()).transpose();

    finish(conditioned, &cs, &cd)
}

/// Compute H such that `dst ~ H * src` from exactly four correspondences.
///
/// Corner order must be consistent between `src` and `dst`. Returns `None`
/// when the linear system is singular, e.g. for repeated corners.
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    let cs = Conditioning::fit(src);
    let cd = Conditioning::fit(dst);

    // Pin h33 = 1: the ninth column moves to the right-hand side.
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for (k, (&s, &d)) in src.iter().zip(dst).enumerate() {
        for (offset, row) in constraint_rows(cs.map(s), cd.map(d)).iter().enumerate() {
            let r = 2 * k + offset;
            for col in 0..8 {
                a[(r, col)] = row[col];
            }
            b[r] = -row[8];
        }
    }

    let x = a.lu().solve(&b)?;
    let conditioned = Matrix3::new(x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7], 1.0);
    finish(conditioned, &cs, &cd)
}
