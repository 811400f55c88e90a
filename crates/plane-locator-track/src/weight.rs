/// Weight used right at the jitter threshold.
pub const MAX_WEIGHT: f32 = 0.9;
/// Weight floor for very large movements.
pub const MIN_WEIGHT: f32 = 0.3;

const KNEE: f32 = 1.5;

/// Share of the previous smoothed position kept for a movement of
/// `displacement` pixels.
///
/// With `n = displacement / threshold`:
/// - `n <= 1.5`: rises linearly from `base` (at 1.5) to 0.9 (at 1.0),
/// - `n > 1.5`: `base * 1.5 / n`, floored at 0.3 and capped at `base`.
pub fn adaptive_weight(displacement: f32, threshold: f32, base: f32) -> f32 {
    let n = displacement / threshold;
    if n <= KNEE {
        base + (MAX_WEIGHT - base) * (KNEE - n) / 0.5
    } else {
        (base * KNEE / n).max(MIN_WEIGHT).min(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn near_threshold_is_most_stable() {
        assert_relative_eq!(adaptive_weight(2.0, 2.0, 0.7), 0.9);
        assert_relative_eq!(adaptive_weight(3.0, 2.0, 0.7), 0.7);
        assert_relative_eq!(adaptive_weight(2.5, 2.0, 0.7), 0.8, epsilon = 1e-6);
    }

    #[test]
    fn large_movements_decay_to_floor() {
        assert_relative_eq!(adaptive_weight(4.0, 2.0, 0.7), 0.525, epsilon = 1e-6);
        assert_relative_eq!(adaptive_weight(100.0, 2.0, 0.7), MIN_WEIGHT);
        // A base below the floor is never exceeded.
        assert_relative_eq!(adaptive_weight(100.0, 2.0, 0.2), 0.2);
    }

    #[test]
    fn weight_is_continuous_at_knee() {
        let below = adaptive_weight(2.9999, 2.0, 0.6);
        let above = adaptive_weight(3.0001, 2.0, 0.6);
        assert!((below - above).abs() < 1e-3);
    }
}
