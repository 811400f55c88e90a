//! Detection thresholds, named presets and JSON helpers.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use plane_locator_core::AspectConstraint;
use serde::{Deserialize, Serialize};

use crate::pose::CameraIntrinsics;

const A4_WIDTH_MM: f32 = 210.0;
const A4_HEIGHT_MM: f32 = 297.0;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("canny thresholds must satisfy 0 <= low <= high (low={low}, high={high})")]
    CannyThresholds { low: f32, high: f32 },
    #[error("blur kernel size must be odd or 0, got {0}")]
    EvenBlurKernel(u32),
    #[error("area ratios must satisfy 0 <= min < max <= 1 (min={min}, max={max})")]
    AreaRatios { min: f32, max: f32 },
    #[error("aspect ratio tolerance must be finite and non-negative, got {0}")]
    AspectTolerance(f32),
    #[error("{name} must be finite and positive, got {value}")]
    NonPositive { name: &'static str, value: f32 },
    #[error("unknown preset `{0}`")]
    UnknownPreset(String),
}

#[derive(thiserror::Error, Debug)]
pub enum PaperIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Thresholds of [`crate::PaperDetector`].
///
/// Defaults describe an A4 sheet with a loose aspect tolerance and pose
/// recovery disabled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub canny_low: f32,
    pub canny_high: f32,
    /// Gaussian kernel side; 0 disables blurring.
    pub blur_kernel_size: u32,
    /// Contour area bounds as fractions of the image area.
    pub min_area_ratio: f32,
    pub max_area_ratio: f32,
    /// Target `min/max` side ratio; `<= 0` disables the aspect test.
    pub expected_aspect_ratio: f32,
    pub aspect_ratio_tolerance: f32,
    /// Physical sheet size; only scales the canonical homography and pose.
    pub paper_width_mm: f32,
    pub paper_height_mm: f32,
    /// `<= 0` disables pose recovery.
    pub focal_length: f64,
    /// Principal point; `<= 0` means image center.
    pub cx: f64,
    pub cy: f64,
    /// Polygon simplification tolerance as a fraction of the contour length.
    pub approx_epsilon_ratio: f32,
    /// Shortest accepted edge as a fraction of the smaller image side.
    pub min_edge_ratio: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            blur_kernel_size: 5,
            min_area_ratio: 0.05,
            max_area_ratio: 0.95,
            expected_aspect_ratio: A4_WIDTH_MM / A4_HEIGHT_MM,
            aspect_ratio_tolerance: 0.3,
            paper_width_mm: A4_WIDTH_MM,
            paper_height_mm: A4_HEIGHT_MM,
            focal_length: 0.0,
            cx: 0.0,
            cy: 0.0,
            approx_epsilon_ratio: 0.035,
            min_edge_ratio: 0.05,
        }
    }
}

impl DetectionConfig {
    pub fn from_preset(preset: PaperPreset) -> Self {
        let (w, h) = preset.dimensions_mm();
        let expected = if preset == PaperPreset::Unconstrained {
            0.0
        } else {
            w.min(h) / w.max(h)
        };
        Self {
            expected_aspect_ratio: expected,
            aspect_ratio_tolerance: preset.aspect_tolerance(),
            paper_width_mm: w,
            paper_height_mm: h,
            ..Self::default()
        }
    }

    /// Enable pose recovery with focal length `f` (pixels).
    pub fn with_focal_length(mut self, f: f64) -> Self {
        self.focal_length = f;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (low, high) = (self.canny_low, self.canny_high);
        if !(low.is_finite() && high.is_finite() && low >= 0.0 && low <= high) {
            return Err(ConfigError::CannyThresholds { low, high });
        }
        if self.blur_kernel_size != 0 && self.blur_kernel_size % 2 == 0 {
            return Err(ConfigError::EvenBlurKernel(self.blur_kernel_size));
        }
        let (min, max) = (self.min_area_ratio, self.max_area_ratio);
        if !(min >= 0.0 && min < max && max <= 1.0) {
            return Err(ConfigError::AreaRatios { min, max });
        }
        let tol = self.aspect_ratio_tolerance;
        if !(tol.is_finite() && tol >= 0.0) {
            return Err(ConfigError::AspectTolerance(tol));
        }
        for (name, value) in [
            ("approx_epsilon_ratio", self.approx_epsilon_ratio),
            ("min_edge_ratio", self.min_edge_ratio),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        Ok(())
    }

    pub fn aspect(&self) -> AspectConstraint {
        AspectConstraint::new(self.expected_aspect_ratio, self.aspect_ratio_tolerance)
    }

    /// Physical `(width, height)`, falling back to A4 for non-positive sizes.
    pub fn physical_size(&self) -> (f32, f32) {
        let w = if self.paper_width_mm > 0.0 {
            self.paper_width_mm
        } else {
            A4_WIDTH_MM
        };
        let h = if self.paper_height_mm > 0.0 {
            self.paper_height_mm
        } else {
            A4_HEIGHT_MM
        };
        (w, h)
    }

    pub fn intrinsics(&self) -> CameraIntrinsics {
        CameraIntrinsics {
            focal_length: self.focal_length,
            cx: self.cx,
            cy: self.cy,
        }
    }

    /// Gaussian sigma matching a `k x k` kernel, `None` when blurring is off.
    pub fn blur_sigma(&self) -> Option<f32> {
        let k = self.blur_kernel_size;
        (k > 1 && k % 2 == 1).then(|| 0.3 * ((k as f32 - 1.0) * 0.5 - 1.0) + 0.8)
    }

    /// Load and validate a JSON config. Missing fields take default values.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, PaperIoError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), PaperIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Common flat rectangular targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperPreset {
    A3,
    A4,
    A5,
    Letter,
    Legal,
    /// ISO/IEC 7810 ID-1 (bank cards, ID cards).
    Id1Card,
    /// US business card, 3.5 x 2 in.
    BusinessCard,
    /// Any convex quadrilateral; physical size defaults to A4.
    Unconstrained,
}

impl PaperPreset {
    pub const ALL: [PaperPreset; 8] = [
        PaperPreset::A3,
        PaperPreset::A4,
        PaperPreset::A5,
        PaperPreset::Letter,
        PaperPreset::Legal,
        PaperPreset::Id1Card,
        PaperPreset::BusinessCard,
        PaperPreset::Unconstrained,
    ];

    /// Portrait `(width, height)` in millimetres.
    pub fn dimensions_mm(self) -> (f32, f32) {
        match self {
            Self::A3 => (297.0, 420.0),
            Self::A4 | Self::Unconstrained => (A4_WIDTH_MM, A4_HEIGHT_MM),
            Self::A5 => (148.0, 210.0),
            Self::Letter => (215.9, 279.4),
            Self::Legal => (215.9, 355.6),
            Self::Id1Card => (53.98, 85.6),
            Self::BusinessCard => (50.8, 88.9),
        }
    }

    fn aspect_tolerance(self) -> f32 {
        match self {
            Self::Id1Card | Self::BusinessCard => 0.15,
            Self::Unconstrained => 0.3,
            _ => 0.2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::A3 => "a3",
            Self::A4 => "a4",
            Self::A5 => "a5",
            Self::Letter => "letter",
            Self::Legal => "legal",
            Self::Id1Card => "id1_card",
            Self::BusinessCard => "business_card",
            Self::Unconstrained => "unconstrained",
        }
    }

    pub fn config(self) -> DetectionConfig {
        DetectionConfig::from_preset(self)
    }
}

impl fmt::Display for PaperPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PaperPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|p| p.name() == key)
            .ok_or_else(|| ConfigError::UnknownPreset(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn defaults_describe_a4() {
        let c = DetectionConfig::default();
        assert!(c.validate().is_ok());
        assert_relative_eq!(c.expected_aspect_ratio, 0.70707, epsilon = 1e-4);
        assert_eq!(c.physical_size(), (210.0, 297.0));
        assert_relative_eq!(c.blur_sigma().expect("blur on"), 1.1, epsilon = 1e-6);
    }

    #[test]
    fn presets_carry_aspect_and_tolerance() {
        let card = PaperPreset::Id1Card.config();
        assert_relative_eq!(card.expected_aspect_ratio, 53.98 / 85.6, epsilon = 1e-6);
        assert_eq!(card.aspect_ratio_tolerance, 0.15);

        let letter = PaperPreset::Letter.config();
        assert_relative_eq!(letter.expected_aspect_ratio, 215.9 / 279.4, epsilon = 1e-6);
        assert_eq!(letter.aspect_ratio_tolerance, 0.2);

        let free = PaperPreset::Unconstrained.config();
        assert!(!free.aspect().is_enabled());
        for p in PaperPreset::ALL {
            assert!(p.config().validate().is_ok(), "{p}");
        }
    }

    #[test]
    fn presets_parse_from_names() {
        assert_eq!("A4".parse::<PaperPreset>(), Ok(PaperPreset::A4));
        assert_eq!("business-card".parse::<PaperPreset>(), Ok(PaperPreset::BusinessCard));
        assert!(matches!(
            "tabloid".parse::<PaperPreset>(),
            Err(ConfigError::UnknownPreset(_))
        ));
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let even = DetectionConfig {
            blur_kernel_size: 4,
            ..DetectionConfig::default()
        };
        assert_eq!(even.validate(), Err(ConfigError::EvenBlurKernel(4)));

        let areas = DetectionConfig {
            min_area_ratio: 0.5,
            max_area_ratio: 0.4,
            ..DetectionConfig::default()
        };
        assert!(matches!(areas.validate(), Err(ConfigError::AreaRatios { .. })));

        let canny = DetectionConfig {
            canny_low: 200.0,
            ..DetectionConfig::default()
        };
        assert!(matches!(canny.validate(), Err(ConfigError::CannyThresholds { .. })));

        let off = DetectionConfig {
            blur_kernel_size: 0,
            ..DetectionConfig::default()
        };
        assert!(off.validate().is_ok());
        assert!(off.blur_sigma().is_none());
    }

    #[test]
    fn non_positive_physical_size_falls_back_to_a4() {
        let c = DetectionConfig {
            paper_width_mm: 0.0,
            paper_height_mm: -3.0,
            ..DetectionConfig::default()
        };
        assert_eq!(c.physical_size(), (210.0, 297.0));
    }
}
