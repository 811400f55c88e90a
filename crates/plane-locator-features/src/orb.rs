//! Oriented FAST keypoints with steered BRIEF descriptors.

use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::corners::{corners_fast9, Corner};
use imageproc::filter::gaussian_blur_f32;
use log::debug;
use nalgebra::Point2;
use plane_locator_core::GrayImageView;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::brief::BriefPattern;
use crate::keypoint::{Features, Keypoint};

/// Parameters of the keypoint detector and descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbParams {
    /// Upper bound on keypoints retained over all pyramid levels.
    pub max_features: usize,
    /// Downscale factor between consecutive pyramid levels.
    pub scale_factor: f32,
    pub n_levels: usize,
    /// Margin (level pixels) in which no keypoint is kept.
    pub edge_threshold: usize,
    /// Intensity difference threshold of the FAST-9 segment test.
    pub fast_threshold: u8,
    /// Side of the described patch, in level pixels.
    pub patch_size: usize,
    /// Harris `k` used to rank FAST corners.
    pub harris_k: f32,
    /// Side of the Harris structure-tensor window.
    pub harris_block: usize,
    /// Blur applied before sampling descriptor pairs.
    pub descriptor_sigma: f32,
}

impl Default for OrbParams {
    fn default() -> Self {
        Self {
            max_features: 1000,
            scale_factor: 1.2,
            n_levels: 8,
            edge_threshold: 31,
            fast_threshold: 20,
            patch_size: 31,
            harris_k: 0.04,
            harris_block: 7,
            descriptor_sigma: 2.0,
        }
    }
}

/// Multi-scale keypoint detector and descriptor extractor.
#[derive(Clone, Debug)]
pub struct OrbDetector {
    params: OrbParams,
    pattern: BriefPattern,
    circle_rows: Vec<i32>,
}

impl Default for OrbDetector {
    fn default() -> Self {
        Self::new(OrbParams::default())
    }
}

impl OrbDetector {
    pub fn new(params: OrbParams) -> Self {
        let pattern = BriefPattern::new(params.patch_size);
        let radius = pattern.radius() as i32;
        let circle_rows = (-radius..=radius)
            .map(|dy| (((radius * radius - dy * dy) as f32).sqrt()).floor() as i32)
            .collect();
        Self {
            params,
            pattern,
            circle_rows,
        }
    }

    pub fn params(&self) -> &OrbParams {
        &self.params
    }

    /// Detect keypoints and compute their descriptors.
    ///
    /// Keypoint positions are returned in `img` pixel coordinates. Images
    /// too small to host a single patch yield an empty result.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, img), fields(width = img.width, height = img.height))
    )]
    pub fn detect_and_compute(&self, img: &GrayImageView<'_>) -> Features {
        let Some(base) = to_image_buffer(img) else {
            return Features::default();
        };

        let p = &self.params;
        let n_levels = p.n_levels.max(1);
        let scale_factor = p.scale_factor.max(1.0 + f32::EPSILON);
        let per_level = features_per_level(p.max_features, scale_factor, n_levels);
        let min_side = 2 * p.edge_threshold as u32 + 1;

        let mut out = Features::default();
        for (level, &budget) in per_level.iter().enumerate() {
            let scale = scale_factor.powi(level as i32);
            let w = (base.width() as f32 / scale).round() as u32;
            let h = (base.height() as f32 / scale).round() as u32;
            if w < min_side || h < min_side {
                break;
            }
            let level_img = if level == 0 {
                base.clone()
            } else {
                imageops::resize(&base, w, h, FilterType::Triangle)
            };
            self.detect_level(&level_img, level, scale, budget, &mut out);
        }

        debug!(
            "keypoints: {} over {}x{} ({} levels)",
            out.len(),
            img.width,
            img.height,
            n_levels
        );
        out
    }

    fn detect_level(
        &self,
        level_img: &GrayImage,
        level: usize,
        scale: f32,
        budget: usize,
        out: &mut Features,
    ) {
        if budget == 0 {
            return;
        }
        let p = &self.params;
        let (w, h) = level_img.dimensions();
        let border = p.edge_threshold as u32;

        let corners: Vec<Corner> = corners_fast9(level_img, p.fast_threshold)
            .into_iter()
            .filter(|c| c.x >= border && c.y >= border && c.x < w - border && c.y < h - border)
            .collect();
        let mut corners = suppress_non_maxima(&corners, w, h);

        corners.sort_by(|a, b| b.score.total_cmp(&a.score));
        corners.truncate(budget * 2);

        let mut ranked: Vec<(Corner, f32)> = corners
            .into_iter()
            .map(|c| {
                let r = harris_response(level_img, c.x, c.y, p.harris_block, p.harris_k);
                (c, r)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(budget);
        if ranked.is_empty() {
            return;
        }

        let smoothed = if p.descriptor_sigma > 0.0 {
            gaussian_blur_f32(level_img, p.descriptor_sigma)
        } else {
            level_img.clone()
        };
        for (c, response) in ranked {
            let angle = self.intensity_centroid_angle(level_img, c.x as i32, c.y as i32);
            let descriptor = self
                .pattern
                .describe(&smoothed, c.x as f32, c.y as f32, angle);
            out.keypoints.push(Keypoint {
                position: Point2::new(c.x as f32 * scale, c.y as f32 * scale),
                angle,
                octave: level as u8,
                size: p.patch_size as f32 * scale,
                response,
            });
            out.descriptors.push(descriptor);
        }
    }

    fn intensity_centroid_angle(&self, img: &GrayImage, cx: i32, cy: i32) -> f32 {
        let radius = (self.circle_rows.len() / 2) as i32;
        let mut m01 = 0.0f32;
        let mut m10 = 0.0f32;
        for (row, &half) in self.circle_rows.iter().enumerate() {
            let dy = row as i32 - radius;
            for dx in -half..=half {
                let v = pixel(img, cx + dx, cy + dy);
                m10 += dx as f32 * v;
                m01 += dy as f32 * v;
            }
        }
        m01.atan2(m10)
    }
}

fn to_image_buffer(img: &GrayImageView<'_>) -> Option<GrayImage> {
    let w = u32::try_from(img.width).ok()?;
    let h = u32::try_from(img.height).ok()?;
    if w == 0 || h == 0 {
        return None;
    }
    GrayImage::from_raw(w, h, img.data.get(..img.width * img.height)?.to_vec())
}

/// Split `total` over levels geometrically, finer levels getting more.
fn features_per_level(total: usize, scale_factor: f32, n_levels: usize) -> Vec<usize> {
    let factor = 1.0 / scale_factor;
    let mut desired = total as f32 * (1.0 - factor) / (1.0 - factor.powi(n_levels as i32));
    let mut out = Vec::with_capacity(n_levels);
    let mut assigned = 0usize;
    for _ in 0..n_levels.saturating_sub(1) {
        let n = (desired.round() as usize).min(total - assigned);
        out.push(n);
        assigned += n;
        desired *= factor;
    }
    out.push(total - assigned);
    out
}

/// 3x3 non-maximum suppression on FAST scores.
///
/// On plateaus the first corner in raster order wins.
fn suppress_non_maxima(corners: &[Corner], w: u32, h: u32) -> Vec<Corner> {
    let idx = |x: u32, y: u32| y as usize * w as usize + x as usize;
    let mut score = vec![f32::NEG_INFINITY; w as usize * h as usize];
    for c in corners {
        score[idx(c.x, c.y)] = c.score;
    }
    corners
        .iter()
        .copied()
        .filter(|c| {
            let here = c.score;
            let mut keep = true;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let (nx, ny) = (c.x as i32 + dx, c.y as i32 + dy);
                    if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                        continue;
                    }
                    let other = score[idx(nx as u32, ny as u32)];
                    let earlier = dy < 0 || (dy == 0 && dx < 0);
                    if other > here || (earlier && other == here) {
                        keep = false;
                    }
                }
            }
            keep
        })
        .collect()
}

#[inline]
fn pixel(img: &GrayImage, x: i32, y: i32) -> f32 {
    let x = x.clamp(0, img.width() as i32 - 1) as u32;
    let y = y.clamp(0, img.height() as i32 - 1) as u32;
    img.get_pixel(x, y)[0] as f32
}

/// Harris response `det(M) - k tr(M)^2` of the Sobel structure tensor.
fn harris_response(img: &GrayImage, x: u32, y: u32, block: usize, k: f32) -> f32 {
    let r = (block / 2) as i32;
    let norm = 1.0 / (4.0 * block as f32 * 255.0);
    let (cx, cy) = (x as i32, y as i32);
    let (mut a, mut b, mut c) = (0.0f32, 0.0f32, 0.0f32);
    for yy in cy - r..=cy + r {
        for xx in cx - r..=cx + r {
            let gx = (pixel(img, xx + 1, yy - 1) + 2.0 * pixel(img, xx + 1, yy) + pixel(img, xx + 1, yy + 1)
                - pixel(img, xx - 1, yy - 1)
                - 2.0 * pixel(img, xx - 1, yy)
                - pixel(img, xx - 1, yy + 1))
                * norm;
            let gy = (pixel(img, xx - 1, yy + 1) + 2.0 * pixel(img, xx, yy + 1) + pixel(img, xx + 1, yy + 1)
                - pixel(img, xx - 1, yy - 1)
                - 2.0 * pixel(img, xx, yy - 1)
                - pixel(img, xx + 1, yy - 1))
                * norm;
            a += gx * gx;
            b += gx * gy;
            c += gy * gy;
        }
    }
    a * c - b * b - k * (a + c) * (a + c)
}
