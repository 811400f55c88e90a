use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A detected salient point.
///
/// `position` is expressed in full-resolution (pyramid level 0) pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub position: Point2<f32>,
    /// Dominant orientation in radians.
    pub angle: f32,
    /// Pyramid level the point was detected on.
    pub octave: u8,
    /// Diameter of the described patch in level-0 pixels.
    pub size: f32,
    /// Harris corner response on the detection level.
    pub response: f32,
}

/// 256-bit binary descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Descriptor(pub [u8; 32]);

impl Descriptor {
    pub const BITS: u32 = 256;

    #[inline]
    pub fn hamming(&self, other: &Descriptor) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

/// Keypoints with their descriptors (same length, same order).
#[derive(Clone, Debug, Default)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl Features {
    #[inline]
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hamming_counts_differing_bits() {
        let a = Descriptor([0u8; 32]);
        let mut bytes = [0u8; 32];
        bytes[0] = 0b1011;
        bytes[31] = 0xff;
        let b = Descriptor(bytes);
        assert_eq!(a.hamming(&b), 11);
        assert_eq!(b.hamming(&b), 0);
        assert_eq!(a.hamming(&Descriptor([0xff; 32])), Descriptor::BITS);
    }
}
