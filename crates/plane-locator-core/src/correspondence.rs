use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A matched point pair: reference-space location and its scene-space image.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub reference: Point2<f32>,
    pub scene: Point2<f32>,
}

impl Correspondence {
    pub fn new(reference: Point2<f32>, scene: Point2<f32>) -> Self {
        Self { reference, scene }
    }
}

/// Zip parallel coordinate arrays into correspondences.
///
/// Returns `None` when the four arrays do not have the same length.
pub fn correspondences_from_arrays(
    ref_x: &[f32],
    ref_y: &[f32],
    scene_x: &[f32],
    scene_y: &[f32],
) -> Option<Vec<Correspondence>> {
    let n = ref_x.len();
    if ref_y.len() != n || scene_x.len() != n || scene_y.len() != n {
        return None;
    }
    Some(
        (0..n)
            .map(|i| {
                Correspondence::new(
                    Point2::new(ref_x[i], ref_y[i]),
                    Point2::new(scene_x[i], scene_y[i]),
                )
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrays_are_zipped_in_order() {
        let c = correspondences_from_arrays(&[1.0, 2.0], &[3.0, 4.0], &[5.0, 6.0], &[7.0, 8.0])
            .expect("same lengths");
        assert_eq!(c.len(), 2);
        assert_eq!(c[1].reference, Point2::new(2.0, 4.0));
        assert_eq!(c[1].scene, Point2::new(6.0, 8.0));
    }

    #[test]
    fn ragged_arrays_are_rejected() {
        assert!(correspondences_from_arrays(&[1.0], &[], &[1.0], &[1.0]).is_none());
    }
}
