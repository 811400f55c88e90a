use approx::assert_relative_eq;
use image::{GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use nalgebra::Point2;
use plane_locator_core::{GrayImageView, Status};
use plane_locator_paper::{DetectionConfig, PaperDetector, PaperIoError, PaperPreset};

fn sheet(size: u32, corners: &[(i32, i32); 4]) -> GrayImage {
    let mut img = GrayImage::from_pixel(size, size, Luma([25]));
    let poly: Vec<Point<i32>> = corners.iter().map(|&(x, y)| Point::new(x, y)).collect();
    draw_polygon_mut(&mut img, &poly, Luma([230]));
    img
}

fn view(img: &GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

fn assert_near(p: Point2<f32>, (x, y): (i32, i32), tol: f32) {
    let d = (p - Point2::new(x as f32, y as f32)).norm();
    assert!(d <= tol, "corner {p:?} is {d:.2}px from ({x}, {y})");
}

#[test]
fn bright_quadrilateral_is_recovered() {
    let truth = [(60, 40), (140, 48), (148, 170), (52, 162)];
    let img = sheet(200, &truth);
    let det = PaperDetector::new(PaperPreset::Unconstrained.config()).expect("valid config");
    let d = det.detect(&view(&img));

    assert_eq!(d.status, Status::Found);
    for (c, t) in d.corners.corners.iter().zip(truth) {
        assert_near(*c, t, 5.0);
    }
    assert!(d.area > 0.05 * 200.0 * 200.0);
    assert!(d.perimeter > 0.0);
    assert!(d.pose.is_none());

    // Canonical rectangle corners land on the reported corners.
    let (w, h) = (210.0f32, 297.0f32);
    let canon = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
    for ((x, y), c) in canon.into_iter().zip(d.corners.corners.iter()) {
        let m = d.homography.apply(Point2::new(x, y));
        assert!((m - c).norm() < 1e-2, "{m:?} vs {c:?}");
    }
}

#[test]
fn rotated_sheet_corners_are_recovered() {
    let (cx, cy, half_w, half_h) = (100.0f32, 100.0f32, 45.0f32, 65.0f32);
    let (sin, cos) = 35f32.to_radians().sin_cos();
    let truth = [(-half_w, -half_h), (half_w, -half_h), (half_w, half_h), (-half_w, half_h)].map(
        |(x, y)| {
            (
                (cx + x * cos - y * sin).round() as i32,
                (cy + x * sin + y * cos).round() as i32,
            )
        },
    );
    let img = sheet(200, &truth);
    let d = PaperDetector::new(PaperPreset::Unconstrained.config())
        .expect("valid config")
        .detect(&view(&img));

    assert_eq!(d.status, Status::Found);
    for t in truth {
        let target = Point2::new(t.0 as f32, t.1 as f32);
        let nearest = d
            .corners
            .corners
            .iter()
            .map(|c| (c - target).norm())
            .fold(f32::INFINITY, f32::min);
        assert!(nearest <= 4.0, "no corner within 4px of {t:?}: {:?}", d.corners.corners);
    }
    assert_relative_eq!(d.aspect_ratio, 90.0 / 130.0, epsilon = 0.05);
}

#[test]
fn landscape_sheet_swaps_canonical_size() {
    let truth = [(30, 60), (170, 60), (170, 150), (30, 150)];
    let img = sheet(200, &truth);
    let det = PaperDetector::new(PaperPreset::Unconstrained.config()).expect("valid config");
    let d = det.detect(&view(&img));
    assert!(d.is_found());

    let top_right = d.homography.apply(Point2::new(297.0, 0.0));
    assert!((top_right - d.corners.corners[1]).norm() < 1e-2);
}

#[test]
fn pose_is_reported_when_focal_length_is_set() {
    let truth = [(60, 40), (140, 48), (148, 170), (52, 162)];
    let img = sheet(200, &truth);
    let config = PaperPreset::Unconstrained.config().with_focal_length(300.0);
    let d = PaperDetector::new(config).expect("valid").detect(&view(&img));
    assert!(d.is_found());
    let pose = d.pose.expect("pose");
    assert!(pose.tvec[2] > 0.0);
}

#[test]
fn wrong_aspect_is_not_found() {
    // A square is far from a bank card's 0.63 ratio.
    let img = sheet(200, &[(50, 50), (150, 50), (150, 150), (50, 150)]);
    let det = PaperDetector::new(PaperPreset::Id1Card.config()).expect("valid");
    let d = det.detect(&view(&img));
    assert_eq!(d.status, Status::NotFound);
    assert!(d.rejection.is_some());
}

#[test]
fn tiny_quadrilateral_is_below_area_floor() {
    let img = sheet(200, &[(90, 90), (110, 90), (110, 115), (90, 115)]);
    let d = PaperDetector::new(PaperPreset::Unconstrained.config())
        .expect("valid")
        .detect(&view(&img));
    assert_eq!(d.status, Status::NotFound);
}

#[test]
fn config_round_trips_through_json_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("letter.json");
    let config = PaperPreset::Letter.config().with_focal_length(1200.0);
    config.write_json(&path).expect("write");
    let back = DetectionConfig::load_json(&path).expect("load");
    assert_eq!(back, config);
}

#[test]
fn invalid_config_file_is_refused() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{ "blur_kernel_size": 4 }"#).expect("write");
    assert!(matches!(
        DetectionConfig::load_json(&path),
        Err(PaperIoError::Config(_))
    ));

    std::fs::write(&path, "{ not json").expect("write");
    assert!(matches!(
        DetectionConfig::load_json(&path),
        Err(PaperIoError::Json(_))
    ));
}
