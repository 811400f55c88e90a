use std::io::Cursor;

use approx::assert_abs_diff_eq;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use nalgebra::Point2;
use plane_locator::core::PixelBuffer;
use plane_locator::detect::{detect_paper_encoded, locate_anchor_encoded};
use plane_locator::locate::{detect_paper_raw, locate_anchor_from_points, locate_anchor_raw};
use plane_locator::{
    AnchorParams, CornerSmoother, DetectionConfig, Homography, PaperPreset, SmootherParams, Status,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn png(img: &GrayImage) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    buf
}

fn rgb_sheet() -> RgbImage {
    let mut img = RgbImage::from_pixel(240, 240, Rgb([30, 40, 35]));
    for y in 50..200 {
        for x in 70..175 {
            img.put_pixel(x, y, Rgb([235, 235, 228]));
        }
    }
    img
}

fn block_texture(w: u32, h: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let cell = 8;
    let cols = w.div_ceil(cell);
    let levels: Vec<u8> = (0..cols * h.div_ceil(cell))
        .map(|_| rng.gen_range(0..=255))
        .collect();
    GrayImage::from_fn(w, h, |x, y| Luma([levels[((y / cell) * cols + x / cell) as usize]]))
}

#[test]
fn raw_rgb_sheet_is_found() {
    let img = rgb_sheet();
    let buf = PixelBuffer::new(240, 240, 3, img.as_raw());
    let d = detect_paper_raw(&buf, None);
    assert_eq!(d.status, Status::Found);
    let expected: [(f32, f32); 4] = [(70.0, 50.0), (174.0, 50.0), (174.0, 199.0), (70.0, 199.0)];
    for (c, (x, y)) in d.corners.corners.iter().zip(expected) {
        assert_abs_diff_eq!(c.x, x, epsilon = 4.0);
        assert_abs_diff_eq!(c.y, y, epsilon = 4.0);
    }
}

#[test]
fn malformed_raw_buffers_are_invalid_input() {
    let data = vec![0u8; 16];
    for buf in [
        PixelBuffer::new(0, 4, 1, &data),
        PixelBuffer::new(4, 4, 2, &data),
        PixelBuffer::new(4, 4, 3, &data),
        PixelBuffer::new(4, 4, 1, &[]),
    ] {
        let d = detect_paper_raw(&buf, None);
        assert_eq!(d.status, Status::InvalidInput);
        assert_eq!(d.homography, Homography::zero());
    }
}

#[test]
fn invalid_config_is_invalid_input() {
    let img = rgb_sheet();
    let buf = PixelBuffer::new(240, 240, 3, img.as_raw());
    let config = DetectionConfig {
        blur_kernel_size: 6,
        ..DetectionConfig::default()
    };
    assert_eq!(detect_paper_raw(&buf, Some(&config)).status, Status::InvalidInput);
}

#[test]
fn encoded_sheet_and_decode_failures() {
    let gray = DynamicImage::ImageRgb8(rgb_sheet()).to_luma8();
    let d = detect_paper_encoded(&png(&gray), Some(&PaperPreset::Unconstrained.config()));
    assert_eq!(d.status, Status::Found);

    assert_eq!(
        detect_paper_encoded(b"definitely not an image", None).status,
        Status::DecodeFailed
    );
    assert_eq!(detect_paper_encoded(&[], None).status, Status::InvalidInput);
}

#[test]
fn anchor_decode_failures_name_the_culprit() {
    let good = png(&block_texture(64, 64, 1));
    let params = AnchorParams::default();
    assert_eq!(
        locate_anchor_encoded(b"garbage", &good, &params).status,
        Status::DecodeFailed
    );
    assert_eq!(
        locate_anchor_encoded(&good, b"garbage", &params).status,
        Status::SceneDecodeFailed
    );
}

#[test]
fn textured_reference_is_found_in_scene() {
    let reference = block_texture(160, 120, 42);
    let mut scene = GrayImage::from_pixel(400, 300, Luma([40]));
    image::imageops::replace(&mut scene, &reference, 100, 80);

    let d = locate_anchor_encoded(&png(&reference), &png(&scene), &AnchorParams::default());
    assert_eq!(d.status, Status::Found, "matches={} inliers={}", d.matches, d.inliers);
    let expected = [(100.0, 80.0), (260.0, 80.0), (260.0, 200.0), (100.0, 200.0)];
    for (c, (x, y)) in d.corners.corners.iter().zip(expected) {
        assert!((c - Point2::new(x, y)).norm() < 3.0, "{c:?} vs ({x}, {y})");
    }
    assert!((d.scale - 1.0).abs() < 0.05);
    assert!(d.rotation.abs() < 0.05);
}

#[test]
fn blank_images_are_not_found() {
    let blank = GrayImage::from_pixel(128, 128, Luma([90]));
    let ref_buf = PixelBuffer::new(128, 128, 1, blank.as_raw());
    let d = locate_anchor_raw(&ref_buf, &ref_buf, &AnchorParams::default());
    assert_eq!(d.status, Status::NotFound);
    assert_eq!(d.matches, 0);
}

#[test]
fn point_arrays_round_trip() {
    let truth = Homography::from_row_major([1.2, 0.1, 40.0, -0.05, 1.1, 25.0, 1e-4, 2e-4, 1.0]);
    let mut rng = StdRng::seed_from_u64(9);
    let (mut rx, mut ry, mut sx, mut sy) = (vec![], vec![], vec![], vec![]);
    for _ in 0..25 {
        let p = Point2::new(rng.gen_range(0.0..200.0), rng.gen_range(0.0..150.0));
        let q = truth.apply(p);
        rx.push(p.x);
        ry.push(p.y);
        sx.push(q.x);
        sy.push(q.y);
    }
    let d = locate_anchor_from_points(&rx, &ry, &sx, &sy, 200.0, 150.0, &AnchorParams::default());
    assert_eq!(d.status, Status::Found);
    assert_eq!(d.inliers, 25);
    let rect = [(0.0, 0.0), (200.0, 0.0), (200.0, 150.0), (0.0, 150.0)];
    for ((x, y), c) in rect.into_iter().zip(d.corners.corners.iter()) {
        let m = d.homography.apply(Point2::new(x, y));
        assert!((m - c).norm() < 1e-3);
    }

    let few = locate_anchor_from_points(
        &rx[..3],
        &ry[..3],
        &sx[..3],
        &sy[..3],
        200.0,
        150.0,
        &AnchorParams::default(),
    );
    assert_eq!(few.status, Status::InvalidInput);
}

#[test]
fn smoother_stabilizes_a_paper_stream() {
    let img = rgb_sheet();
    let buf = PixelBuffer::new(240, 240, 3, img.as_raw());
    let first = detect_paper_raw(&buf, None);
    assert!(first.is_found());

    let mut smoother = CornerSmoother::new(SmootherParams::default()).expect("valid");
    let a = smoother.update(first.clone());
    let b = smoother.update(first.clone());
    assert_eq!(a.corners, first.corners);
    assert_eq!(b.corners, first.corners);

    let lost = detect_paper_raw(&PixelBuffer::new(0, 0, 1, &[]), None);
    assert_eq!(smoother.update(lost).status, Status::InvalidInput);
    assert!(!smoother.is_tracking());
}
