//! Pose of a known-size planar rectangle from its four image corners.

use nalgebra::{Matrix3, Point2, Rotation3, SMatrix, SVector, Vector3};
use plane_locator_core::{homography_from_4pt, Quad};
use serde::{Deserialize, Serialize};

const GN_MAX_ITERS: usize = 20;
const GN_STEP: f64 = 1e-6;

/// Pinhole intrinsics with square pixels and no distortion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Focal length in pixels; `<= 0` disables pose recovery.
    pub focal_length: f64,
    /// Principal point; `<= 0` selects the image center.
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    pub fn is_enabled(&self) -> bool {
        self.focal_length > 0.0
    }

    /// Camera matrix for a `width x height` image, `None` when disabled.
    pub fn matrix(&self, width: usize, height: usize) -> Option<Matrix3<f64>> {
        if !self.is_enabled() {
            return None;
        }
        let cx = if self.cx > 0.0 { self.cx } else { width as f64 / 2.0 };
        let cy = if self.cy > 0.0 { self.cy } else { height as f64 / 2.0 };
        let f = self.focal_length;
        Some(Matrix3::new(f, 0.0, cx, 0.0, f, cy, 0.0, 0.0, 1.0))
    }
}

/// Object-to-camera transform: `X_cam = R(rvec) X_obj + tvec`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanarPose {
    /// Rodrigues rotation vector (axis times angle, radians).
    pub rvec: [f64; 3],
    /// Translation in the physical units of the object size.
    pub tvec: [f64; 3],
}

impl PlanarPose {
    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::new(Vector3::from(self.rvec))
    }

    /// Project an object-plane point `(x, y, 0)` into the image.
    pub fn project(&self, k: &Matrix3<f64>, x: f64, y: f64) -> Option<Point2<f64>> {
        project(k, &self.rotation(), &Vector3::from(self.tvec), x, y)
    }
}

/// Solve for the pose of a `width x height` rectangle at `Z = 0` whose
/// corners `(0,0), (w,0), (w,h), (0,h)` appear at `image.corners`.
///
/// Initialized by decomposing the plane homography, then refined by
/// Gauss-Newton on the reprojection error. Returns `None` when the corners
/// are degenerate or the solution is not finite.
pub fn estimate_planar_pose(
    image: &Quad,
    width: f32,
    height: f32,
    k: &Matrix3<f64>,
) -> Option<PlanarPose> {
    let object = Quad::rect(width, height).corners;
    let h = homography_from_4pt(&object, &image.corners)?;
    let k_inv = k.try_inverse()?;
    let m = k_inv * h.h;

    let (m1, m2, m3) = (m.column(0), m.column(1), m.column(2));
    let norm = 0.5 * (m1.norm() + m2.norm());
    if !(norm > f64::EPSILON) {
        return None;
    }
    let mut lambda = 1.0 / norm;
    if m3[2] * lambda < 0.0 {
        lambda = -lambda;
    }
    let r1: Vector3<f64> = m1 * lambda;
    let r2: Vector3<f64> = m2 * lambda;
    let t: Vector3<f64> = m3 * lambda;
    let r = nearest_rotation(&Matrix3::from_columns(&[r1, r2, r1.cross(&r2)]))?;

    let obj: Vec<(f64, f64)> = object.iter().map(|p| (p.x as f64, p.y as f64)).collect();
    let img: Vec<Point2<f64>> = image.corners.iter().map(|p| p.cast::<f64>()).collect();

    let mut params = SVector::<f64, 6>::zeros();
    params
        .fixed_rows_mut::<3>(0)
        .copy_from(&r.scaled_axis());
    params.fixed_rows_mut::<3>(3).copy_from(&t);

    let params = refine(k, &obj, &img, params);
    let pose = PlanarPose {
        rvec: [params[0], params[1], params[2]],
        tvec: [params[3], params[4], params[5]],
    };
    (pose.rvec.iter().chain(pose.tvec.iter()).all(|v| v.is_finite()) && pose.tvec[2] > 0.0)
        .then_some(pose)
}

/// Closest proper rotation in the Frobenius sense.
fn nearest_rotation(m: &Matrix3<f64>) -> Option<Rotation3<f64>> {
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let d = (u * v_t).determinant().signum();
    let fix = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, d));
    Some(Rotation3::from_matrix_unchecked(u * fix * v_t))
}

fn project(
    k: &Matrix3<f64>,
    r: &Rotation3<f64>,
    t: &Vector3<f64>,
    x: f64,
    y: f64,
) -> Option<Point2<f64>> {
    let pc = r * Vector3::new(x, y, 0.0) + t;
    if pc.z <= f64::EPSILON {
        return None;
    }
    let uv = k * (pc / pc.z);
    Some(Point2::new(uv.x, uv.y))
}

fn residuals(
    k: &Matrix3<f64>,
    obj: &[(f64, f64)],
    img: &[Point2<f64>],
    p: &SVector<f64, 6>,
) -> Option<SVector<f64, 8>> {
    let r = Rotation3::new(Vector3::new(p[0], p[1], p[2]));
    let t = Vector3::new(p[3], p[4], p[5]);
    let mut out = SVector::<f64, 8>::zeros();
    for (i, (&(x, y), m)) in obj.iter().zip(img).enumerate() {
        let q = project(k, &r, &t, x, y)?;
        out[2 * i] = q.x - m.x;
        out[2 * i + 1] = q.y - m.y;
    }
    Some(out)
}

fn refine(
    k: &Matrix3<f64>,
    obj: &[(f64, f64)],
    img: &[Point2<f64>],
    mut params: SVector<f64, 6>,
) -> SVector<f64, 6> {
    let Some(mut r) = residuals(k, obj, img, &params) else {
        return params;
    };
    let mut cost = r.norm_squared();

    for _ in 0..GN_MAX_ITERS {
        let mut jac = SMatrix::<f64, 8, 6>::zeros();
        for j in 0..6 {
            let step = GN_STEP * params[j].abs().max(1.0);
            let mut plus = params;
            let mut minus = params;
            plus[j] += step;
            minus[j] -= step;
            let (Some(rp), Some(rm)) = (
                residuals(k, obj, img, &plus),
                residuals(k, obj, img, &minus),
            ) else {
                return params;
            };
            jac.set_column(j, &((rp - rm) / (2.0 * step)));
        }

        let jt = jac.transpose();
        let Some(delta) = (jt * jac).lu().solve(&(-(jt * r))) else {
            break;
        };
        let candidate = params + delta;
        match residuals(k, obj, img, &candidate) {
            Some(rc) if rc.norm_squared() < cost => {
                params = candidate;
                r = rc;
                let improvement = cost - r.norm_squared();
                cost = r.norm_squared();
                if improvement < 1e-12 * cost.max(1.0) {
                    break;
                }
            }
            _ => break,
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn camera() -> Matrix3<f64> {
        CameraIntrinsics {
            focal_length: 800.0,
            cx: 320.0,
            cy: 240.0,
        }
        .matrix(640, 480)
        .expect("enabled")
    }

    #[test]
    fn principal_point_defaults_to_image_center() {
        let k = CameraIntrinsics {
            focal_length: 500.0,
            cx: 0.0,
            cy: -1.0,
        }
        .matrix(640, 480)
        .expect("enabled");
        assert_eq!(k[(0, 2)], 320.0);
        assert_eq!(k[(1, 2)], 240.0);
        assert!(CameraIntrinsics::default().matrix(640, 480).is_none());
    }

    #[test]
    fn recovers_synthetic_pose() {
        let k = camera();
        let truth = PlanarPose {
            rvec: [0.15, -0.2, 0.05],
            tvec: [-100.0, -140.0, 700.0],
        };
        let (w, h) = (210.0f32, 297.0f32);
        let corners = Quad::rect(w, h).corners.map(|p| {
            let q = truth
                .project(&k, p.x as f64, p.y as f64)
                .expect("in front of camera");
            Point2::new(q.x as f32, q.y as f32)
        });

        let pose = estimate_planar_pose(&Quad::new(corners), w, h, &k).expect("solvable");
        for (a, b) in pose.rvec.iter().zip(truth.rvec.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-3);
        }
        for (a, b) in pose.tvec.iter().zip(truth.tvec.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 0.5);
        }
    }

    #[test]
    fn fronto_parallel_sheet_has_no_rotation() {
        let k = camera();
        // 210x297 at depth 1000 scales by 0.8 around the principal point.
        let corners = Quad::rect(210.0, 297.0)
            .corners
            .map(|p| Point2::new(320.0 + 0.8 * p.x, 240.0 + 0.8 * p.y));
        let pose = estimate_planar_pose(&Quad::new(corners), 210.0, 297.0, &k).expect("solvable");
        for v in pose.rvec {
            assert_abs_diff_eq!(v, 0.0, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(pose.tvec[0], 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(pose.tvec[1], 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(pose.tvec[2], 1000.0, epsilon = 1e-2);
    }

    #[test]
    fn collapsed_corners_have_no_pose() {
        let k = camera();
        let q = Quad::new([Point2::new(10.0, 10.0); 4]);
        assert!(estimate_planar_pose(&q, 210.0, 297.0, &k).is_none());
    }
}
