use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_circle_mut;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    error::{DropletError, Result},
    loss::circle::CircleEstimate,
    traits::CircleEstimator,
    types::{DropletRecord, LabelMap, Region},
};

/// Geometric loss with the per-droplet records it was computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometricLoss {
    /// Pixel-weighted mismatch against the fitted circles, in `[0, 1]`
    pub value: f64,
    /// One record per droplet, ascending label
    pub records: Vec<DropletRecord>,
}

/// Pixel counts of `region` against its synthetic circle: `(symmetric difference, union)`.
///
/// The circle is rasterized on a window covering both the region and the
/// circle, clipped to the image; pixels off the image never count.
fn circle_mismatch(region: &Region, circle: &CircleEstimate, width: u32, height: u32) -> (usize, usize) {
    let r = circle.radius as i64;
    let (cx, cy) = (circle.center_x as i64, circle.center_y as i64);
    let x0 = (region.min_x as i64).min(cx - r).max(0);
    let y0 = (region.min_y as i64).min(cy - r).max(0);
    let x1 = (region.max_x as i64).max(cx + r).min(width as i64 - 1);
    let y1 = (region.max_y as i64).max(cy + r).min(height as i64 - 1);
    let (w, h) = ((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);

    let mut disk = GrayImage::new(w, h);
    draw_filled_circle_mut(&mut disk, ((cx - x0) as i32, (cy - y0) as i32), r as i32, Luma([1]));

    let mut droplet = GrayImage::new(w, h);
    for &(x, y) in &region.pixels {
        droplet.put_pixel((x as i64 - x0) as u32, (y as i64 - y0) as u32, Luma([1]));
    }

    droplet
        .pixels()
        .zip(disk.pixels())
        .fold((0, 0), |(diff, union), (d, c)| match (d[0] != 0, c[0] != 0) {
            (true, true) => (diff, union + 1),
            (false, false) => (diff, union),
            _ => (diff + 1, union + 1),
        })
}

/// Score how closely each droplet matches a filled circle.
///
/// Each region contributes `|symmetric difference| / |union| * pixels`; the sum is
/// divided by the total droplet pixel count.
pub fn geometric_loss(labels: &LabelMap, sample_id: &str, estimator: &dyn CircleEstimator) -> Result<GeometricLoss> {
    let regions = labels.regions();
    if regions.is_empty() {
        return Err(DropletError::EmptySegmentation);
    }

    let (width, height) = labels.dimensions();
    let mut weighted = 0.0;
    let mut total_pixels = 0usize;
    let mut records = Vec::with_capacity(regions.len());

    for region in regions.values() {
        let circle = estimator.estimate(region);
        let (diff, union) = circle_mismatch(region, &circle, width, height);
        let pixels = region.pixel_count();
        let score = diff as f64 / union as f64 * pixels as f64;
        trace!(label = region.label, pixels, diff, union, score, "droplet circle fit");

        weighted += score;
        total_pixels += pixels;
        records.push(DropletRecord {
            sample_id: sample_id.to_string(),
            label: region.label,
            centroid_x: circle.center_x,
            centroid_y: circle.center_y,
            diameter_x: circle.diameter_x,
            diameter_y: circle.diameter_y,
            pixel_count: pixels,
        });
    }

    Ok(GeometricLoss { value: weighted / total_pixels as f64, records })
}
