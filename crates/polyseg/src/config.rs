use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{PolysegError, Result};

/// Minimum contour area used by the dense (per-class) plugins
pub const DEFAULT_MIN_AREA: f64 = 100.0;
/// Douglas-Peucker tolerance as a fraction of the contour perimeter
pub const DEFAULT_EPSILON_RATIO: f64 = 0.005;
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Which traced contours of one mask become detections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContourPolicy {
    /// Every contour with area >= `min_area` (square pixels)
    MinimumArea {
        #[schemars(range(min = 0.0))]
        min_area: f64,
    },
    /// Only the single largest contour, no area filter
    LargestOnly,
    /// Every contour, no area filter
    All,
}

impl Default for ContourPolicy {
    fn default() -> Self {
        Self::MinimumArea { min_area: DEFAULT_MIN_AREA }
    }
}

/// Parameters of the mask-to-polygon extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Probability threshold; a pixel is foreground iff value > threshold
    #[schemars(range(min = 0.0, max = 1.0))]
    pub threshold: f32,
    pub contour_policy: ContourPolicy,
    /// Simplification tolerance relative to the contour perimeter
    #[schemars(range(min = 0.0))]
    pub epsilon_ratio: f64,
    /// Reduce straight pixel runs to their end points before simplifying
    pub compress_chains: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            contour_policy: ContourPolicy::default(),
            epsilon_ratio: DEFAULT_EPSILON_RATIO,
            compress_chains: true,
        }
    }
}

impl ExtractorConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(PolysegError::InvalidConfig(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if !self.epsilon_ratio.is_finite() || self.epsilon_ratio < 0.0 {
            return Err(PolysegError::InvalidConfig(format!(
                "epsilon_ratio must be a non-negative number, got {}",
                self.epsilon_ratio
            )));
        }
        if let ContourPolicy::MinimumArea { min_area } = self.contour_policy {
            if !min_area.is_finite() || min_area < 0.0 {
                return Err(PolysegError::InvalidConfig(format!(
                    "min_area must be a non-negative number, got {}",
                    min_area
                )));
            }
        }
        Ok(())
    }

    /// JSON schema of the extractor configuration
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ExtractorConfig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExtractorConfig::default();
        assert_eq!(config.threshold, 0.5);
        assert_eq!(config.contour_policy, ContourPolicy::MinimumArea { min_area: 100.0 });
        assert_eq!(config.epsilon_ratio, 0.005);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let config = ExtractorConfig { threshold: 1.5, ..Default::default() };
        assert!(config.validate().is_err());

        let config = ExtractorConfig { epsilon_ratio: -0.1, ..Default::default() };
        assert!(config.validate().is_err());

        let config = ExtractorConfig {
            contour_policy: ContourPolicy::MinimumArea { min_area: f64::NAN },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ExtractorConfig =
            serde_json::from_str(r#"{ "contour_policy": { "type": "largest_only" } }"#).unwrap();
        assert_eq!(config.contour_policy, ContourPolicy::LargestOnly);
        assert_eq!(config.threshold, 0.5);
    }
}
