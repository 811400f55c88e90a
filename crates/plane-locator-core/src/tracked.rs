use nalgebra::Point2;

/// A detection result that can be fed through the temporal corner smoother.
///
/// Both pipelines' results implement this, so one smoother type serves both.
pub trait TrackedDetection: Clone {
    /// Whether the detection produced a usable quadrilateral.
    fn is_valid(&self) -> bool;

    /// Detected corners, in the order the smoother should track them.
    fn corners(&self) -> &[Point2<f32>];

    /// Copy of `self` with corners and center replaced; every other field kept.
    fn with_corners(&self, corners: &[Point2<f32>], center: Point2<f32>) -> Self;
}
