//! Steered BRIEF sampling pattern and descriptor extraction.

use image::GrayImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::keypoint::Descriptor;

const PATTERN_SEED: u64 = 0x0b_0f_5e_ed;

/// 256 point-pair offsets inside a circular patch.
///
/// Offsets are drawn from an isotropic Gaussian (sigma = patch / 5) and
/// clipped to the patch radius, so the pattern stays inside the patch for
/// any rotation. Generation is seeded; two patterns built with the same
/// patch size are identical.
#[derive(Clone, Debug)]
pub struct BriefPattern {
    pairs: Vec<[(f32, f32); 2]>,
    radius: f32,
}

impl BriefPattern {
    pub fn new(patch_size: usize) -> Self {
        let radius = (patch_size / 2).max(1) as f32;
        let sigma = patch_size as f32 / 5.0;
        let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
        let pairs = (0..Descriptor::BITS)
            .map(|_| {
                [
                    sample_offset(&mut rng, sigma, radius),
                    sample_offset(&mut rng, sigma, radius),
                ]
            })
            .collect();
        Self { pairs, radius }
    }

    /// Radius of the sampled disk, in level pixels.
    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Describe the patch around `(cx, cy)` rotated by `angle` radians.
    ///
    /// `smoothed` should be a blurred copy of the detection level. Reads
    /// outside the image are clamped to the border.
    pub fn describe(&self, smoothed: &GrayImage, cx: f32, cy: f32, angle: f32) -> Descriptor {
        let (sin, cos) = angle.sin_cos();
        let mut bytes = [0u8; 32];
        for (i, [a, b]) in self.pairs.iter().enumerate() {
            let ia = sample_rotated(smoothed, cx, cy, *a, cos, sin);
            let ib = sample_rotated(smoothed, cx, cy, *b, cos, sin);
            if ia < ib {
                bytes[i / 8] |= 1 << (i % 8);
            }
        }
        Descriptor(bytes)
    }
}

fn sample_offset(rng: &mut StdRng, sigma: f32, radius: f32) -> (f32, f32) {
    // Box-Muller, rejecting draws outside the disk.
    loop {
        let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
        let u2: f32 = rng.gen();
        let r = sigma * (-2.0 * u1.ln()).sqrt();
        let t = std::f32::consts::TAU * u2;
        let (x, y) = ((r * t.cos()).round(), (r * t.sin()).round());
        if x * x + y * y <= radius * radius {
            return (x, y);
        }
    }
}

#[inline]
fn sample_rotated(
    img: &GrayImage,
    cx: f32,
    cy: f32,
    (dx, dy): (f32, f32),
    cos: f32,
    sin: f32,
) -> u8 {
    let x = (cx + cos * dx - sin * dy).round() as i64;
    let y = (cy + sin * dx + cos * dy).round() as i64;
    let x = x.clamp(0, img.width() as i64 - 1) as u32;
    let y = y.clamp(0, img.height() as i64 - 1) as u32;
    img.get_pixel(x, y)[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_is_deterministic_and_inside_patch() {
        let a = BriefPattern::new(31);
        let b = BriefPattern::new(31);
        assert_eq!(a.pairs.len(), 256);
        assert_eq!(a.pairs, b.pairs);
        for [p, q] in &a.pairs {
            assert!(p.0 * p.0 + p.1 * p.1 <= a.radius() * a.radius());
            assert!(q.0 * q.0 + q.1 * q.1 <= a.radius() * a.radius());
        }
    }

    #[test]
    fn flat_patch_yields_zero_descriptor() {
        let img = GrayImage::from_pixel(64, 64, image::Luma([120]));
        let d = BriefPattern::new(31).describe(&img, 32.0, 32.0, 0.7);
        assert_eq!(d, Descriptor([0; 32]));
    }
}
