use serde::{Deserialize, Serialize};

use crate::keypoint::Descriptor;

/// Nearest/second-nearest ratio test settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchParams {
    /// A match is kept when `best < ratio * second_best`.
    pub ratio: f32,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self { ratio: 0.75 }
    }
}

/// Index pair of an accepted match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorMatch {
    pub query: usize,
    pub train: usize,
    pub distance: u32,
}

/// Brute-force Hamming 2-NN matching with the ratio test.
///
/// Output order follows the query set. Queries with fewer than two train
/// candidates never pass. Ties for nearest resolve to the lower train index.
pub fn match_descriptors(
    query: &[Descriptor],
    train: &[Descriptor],
    params: &MatchParams,
) -> Vec<DescriptorMatch> {
    if train.len() < 2 {
        return Vec::new();
    }
    query
        .iter()
        .enumerate()
        .filter_map(|(qi, q)| {
            let mut best = (u32::MAX, usize::MAX);
            let mut second = u32::MAX;
            for (ti, t) in train.iter().enumerate() {
                let d = q.hamming(t);
                if d < best.0 {
                    second = best.0;
                    best = (d, ti);
                } else if d < second {
                    second = d;
                }
            }
            ((best.0 as f32) < params.ratio * second as f32).then_some(DescriptorMatch {
                query: qi,
                train: best.1,
                distance: best.0,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(fill: u8, first: u8) -> Descriptor {
        let mut b = [fill; 32];
        b[0] = first;
        Descriptor(b)
    }

    #[test]
    fn distinctive_match_passes_ratio_test() {
        let train = vec![desc(0x00, 0), desc(0xff, 0xff)];
        let query = vec![desc(0x00, 0b1)];
        let m = match_descriptors(&query, &train, &MatchParams::default());
        assert_eq!(
            m,
            vec![DescriptorMatch {
                query: 0,
                train: 0,
                distance: 1
            }]
        );
    }

    #[test]
    fn ambiguous_match_is_dropped() {
        let train = vec![desc(0x00, 0b0000_0011), desc(0x00, 0b0000_1100)];
        let query = vec![desc(0x00, 0)];
        assert!(match_descriptors(&query, &train, &MatchParams::default()).is_empty());
    }

    #[test]
    fn single_train_descriptor_never_matches() {
        let train = vec![desc(0, 0)];
        assert!(match_descriptors(&train.clone(), &train, &MatchParams::default()).is_empty());
    }
}
