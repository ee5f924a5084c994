use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use crate::error::{DropletError, Result};

/// Options recognised by the watershed segmenter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Run the second watershed fold (large droplets) instead of a single pass
    pub double_fold: bool,
    /// Regions with more pixels than this are treated as merged artifacts
    pub large_region_pixel_cap: usize,
    /// The adaptive small-region cutoff is only applied when it exceeds this
    pub pixel_diff_threshold: usize,
    /// Side of the square used to grow cleaned seeds back to droplet size
    #[schemars(range(min = 1))]
    pub dilate_kernel_size: u32,
    /// Emit the small-region cutoff curve through tracing
    pub plot_diagnostics: bool,
    /// Reject regions whose chord profiles are polymodal
    pub remove_artifacts: bool,
    /// Seed threshold on the normalized distance transform
    pub border_threshold: u8,
    pub calibration: SegmentationCalibration,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            double_fold: true,
            large_region_pixel_cap: 10_000,
            pixel_diff_threshold: 100,
            dilate_kernel_size: 5,
            plot_diagnostics: false,
            remove_artifacts: false,
            border_threshold: 0,
            calibration: SegmentationCalibration::default(),
        }
    }
}

/// Heuristic constants tuned on sample data.
///
/// These are calibration points, not derived optima.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SegmentationCalibration {
    /// Forward-difference window used to find the gap between fragments and droplets
    pub gap_window: usize,
    /// Median blur radius applied before Otsu thresholding
    pub median_radius: u32,
    /// Opening element before the first fold
    pub first_open_size: u32,
    /// Opening element before the second fold
    pub second_open_size: u32,
    /// Element used to build the ambiguous border ring
    pub border_element_size: u32,
    /// The droplet fill value is the mean distinct gray level divided by this
    pub fill_divisor: f64,
}

impl Default for SegmentationCalibration {
    fn default() -> Self {
        Self {
            gap_window: 5,
            median_radius: 2,
            first_open_size: 4,
            second_open_size: 5,
            border_element_size: 3,
            fill_divisor: 4.0,
        }
    }
}

/// Circle-fit strategy used by the geometric loss
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CircleFitStrategy {
    /// Midpoint of the nonzero row/column span; cheap and tolerant of concavities
    #[default]
    MidpointSpan,
    /// Pixel centroid with an equal-area radius
    Centroid,
}

/// Options for the loss scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LossConfig {
    /// User's rough estimate of the most droplets any image can hold
    pub max_droplets_estimate: f64,
    /// Multiplier applied to the estimate so the count loss stays within [0, 1]
    pub count_slack: f64,
    pub circle_fit: CircleFitStrategy,
    /// Weight of the yield loss in the combined score
    pub yield_weight: f64,
    /// Weight of the geometric loss in the combined score
    pub geometric_weight: f64,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            max_droplets_estimate: 100.0,
            count_slack: 1.5,
            circle_fit: CircleFitStrategy::MidpointSpan,
            yield_weight: 0.5,
            geometric_weight: 0.5,
        }
    }
}

fn invalid(message: impl Into<String>) -> DropletError {
    DropletError::InvalidConfiguration(message.into())
}

fn parse_json<T: DeserializeOwned>(content: &str) -> Result<T> {
    serde_json::from_str(content).map_err(|e| invalid(e.to_string()))
}

fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T> {
    toml::from_str(content).map_err(|e| invalid(e.to_string()))
}

fn parse_value<'de, T: Deserialize<'de>, D: Deserializer<'de>>(deserializer: D) -> Result<T> {
    T::deserialize(deserializer).map_err(|e| invalid(e.to_string()))
}

impl SegmentationConfig {
    /// Parse and validate; a non-boolean `double_fold` is rejected here
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = parse_json(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = parse_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse an already-decoded table, e.g. a `serde_json::Value` or `toml::Value`
    pub fn from_deserializer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Self> {
        let config: Self = parse_value(deserializer)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.calibration;
        if self.dilate_kernel_size == 0 {
            return Err(invalid("dilate_kernel_size must be at least 1"));
        }
        if c.gap_window == 0 {
            return Err(invalid("calibration.gap_window must be at least 1"));
        }
        if c.first_open_size == 0 || c.second_open_size == 0 || c.border_element_size == 0 {
            return Err(invalid("opening and border element sizes must be at least 1"));
        }
        if !(c.fill_divisor.is_finite() && c.fill_divisor > 0.0) {
            return Err(invalid("calibration.fill_divisor must be positive"));
        }
        Ok(())
    }
}

impl LossConfig {
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = parse_json(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = parse_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_deserializer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Self> {
        let config: Self = parse_value(deserializer)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.max_droplets_estimate.is_finite() && self.max_droplets_estimate > 0.0) {
            return Err(invalid("max_droplets_estimate must be positive"));
        }
        if !(self.count_slack.is_finite() && self.count_slack > 0.0) {
            return Err(invalid("count_slack must be positive"));
        }
        if self.yield_weight < 0.0 || self.geometric_weight < 0.0 || self.yield_weight + self.geometric_weight <= 0.0 {
            return Err(invalid("loss weights must be non-negative with a positive sum"));
        }
        Ok(())
    }

    /// Weighted mean of the two losses
    pub fn combine(&self, yield_loss: f64, geometric_loss: f64) -> f64 {
        (self.yield_weight * yield_loss + self.geometric_weight * geometric_loss)
            / (self.yield_weight + self.geometric_weight)
    }
}
