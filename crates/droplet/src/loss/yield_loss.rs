use serde::{Deserialize, Serialize};

use crate::types::LabelMap;

/// Yield loss with its two halves
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YieldLoss {
    /// `(effective_max - droplets) / effective_max`
    pub count_loss: f64,
    /// Background fraction of the raster
    pub area_loss: f64,
    /// Mean of the two; negative when the droplet count exceeds the effective maximum
    pub value: f64,
}

/// Reward many droplets and a large covered area.
///
/// `effective_max = max_droplets_estimate * count_slack`. The result is left
/// unclamped, so a negative value tells the caller to raise the estimate.
pub fn yield_loss(labels: &LabelMap, max_droplets_estimate: f64, count_slack: f64) -> YieldLoss {
    let effective_max = max_droplets_estimate * count_slack;
    let droplets = labels.region_count() as f64;
    let count_loss = (effective_max - droplets) / effective_max;
    let total = labels.total_pixels();
    let area_loss = if total == 0 {
        1.0
    } else {
        labels.background_pixels() as f64 / total as f64
    };
    YieldLoss { count_loss, area_loss, value: (count_loss + area_loss) / 2.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(count: u32) -> LabelMap {
        LabelMap::from_fn(10 * count.max(1), 10, |x, y| {
            if count > 0 && (1..9).contains(&(x % 10)) && (1..9).contains(&y) {
                x / 10 + 1
            } else {
                0
            }
        })
    }

    #[test]
    fn test_no_droplets_gives_full_count_loss() {
        let loss = yield_loss(&blocks(0), 4.0, 1.5);
        assert_eq!(loss.count_loss, 1.0);
        assert_eq!(loss.area_loss, 1.0);
        assert_eq!(loss.value, 1.0);
    }

    #[test]
    fn test_effective_max_droplets_gives_zero_count_loss() {
        let loss = yield_loss(&blocks(3), 2.0, 1.5);
        assert_eq!(loss.count_loss, 0.0);
        assert!((loss.area_loss - 0.36).abs() < 1e-12);
        assert!((loss.value - 0.18).abs() < 1e-12);
    }

    #[test]
    fn test_overshooting_estimate_goes_negative() {
        let loss = yield_loss(&blocks(3), 1.0, 1.5);
        assert!(loss.count_loss < 0.0);
    }
}
