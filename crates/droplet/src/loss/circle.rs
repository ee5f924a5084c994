use serde::{Deserialize, Serialize};

use crate::{config::CircleFitStrategy, traits::CircleEstimator, types::Region};

/// Circle fitted to one region, in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleEstimate {
    pub center_x: u32,
    pub center_y: u32,
    /// Chord estimate along x, from the column profile
    pub diameter_x: f64,
    /// Chord estimate along y, from the row profile
    pub diameter_y: f64,
    pub radius: u32,
}

/// Midpoint of the occupied span and the chord there, averaged with the longest chord.
///
/// Returns `(midpoint offset, diameter)` relative to the profile start.
fn span_midpoint(profile: &[u32]) -> (u32, f64) {
    let start = profile.iter().position(|&c| c > 0).unwrap_or(0);
    let occupied = profile.iter().filter(|&&c| c > 0).count();
    let mid = (start + occupied / 2).min(profile.len().saturating_sub(1));
    let max = profile.iter().copied().max().unwrap_or(0);
    let chord = profile.get(mid).copied().unwrap_or(0);
    (mid as u32, (chord as f64 + max as f64) / 2.0)
}

/// Center at the middle of the nonzero row and column spans
#[derive(Debug, Clone, Copy, Default)]
pub struct MidpointSpanEstimator;

impl CircleEstimator for MidpointSpanEstimator {
    fn estimate(&self, region: &Region) -> CircleEstimate {
        let (mid_x, diameter_x) = span_midpoint(&region.column_profile());
        let (mid_y, diameter_y) = span_midpoint(&region.row_profile());
        let radius = ((diameter_x / 2.0 + diameter_y / 2.0) / 2.0).floor() as u32;
        CircleEstimate {
            center_x: region.min_x + mid_x,
            center_y: region.min_y + mid_y,
            diameter_x,
            diameter_y,
            radius,
        }
    }
}

/// Pixel centroid with the radius of the equal-area circle
#[derive(Debug, Clone, Copy, Default)]
pub struct CentroidEstimator;

impl CircleEstimator for CentroidEstimator {
    fn estimate(&self, region: &Region) -> CircleEstimate {
        let n = region.pixel_count().max(1) as f64;
        let (sx, sy) = region
            .pixels
            .iter()
            .fold((0u64, 0u64), |(sx, sy), &(x, y)| (sx + x as u64, sy + y as u64));
        CircleEstimate {
            center_x: (sx as f64 / n).round() as u32,
            center_y: (sy as f64 / n).round() as u32,
            diameter_x: region.bbox_width() as f64,
            diameter_y: region.bbox_height() as f64,
            radius: (n / std::f64::consts::PI).sqrt().floor() as u32,
        }
    }
}

/// Estimator behind a configured strategy
pub fn estimator_for(strategy: CircleFitStrategy) -> Box<dyn CircleEstimator> {
    match strategy {
        CircleFitStrategy::MidpointSpan => Box::new(MidpointSpanEstimator),
        CircleFitStrategy::Centroid => Box::new(CentroidEstimator),
    }
}
