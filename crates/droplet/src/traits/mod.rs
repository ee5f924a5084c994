use image::RgbImage;
use crate::{
    error::Result,
    loss::CircleEstimate,
    optimizer::Observation,
    types::{LabelMap, Region},
};

/// Trait for raster preprocessing ahead of segmentation
pub trait ImagePreprocessor: Send + Sync {
    /// Produce a new normalized raster (e.g. rotated and cropped)
    fn preprocess(&self, image: &RgbImage) -> Result<RgbImage>;
}

/// Trait for droplet segmentation algorithms
pub trait Segmenter: Send + Sync {
    /// Segment a color raster into a per-droplet label map
    fn segment(&self, image: &RgbImage) -> Result<LabelMap>;
}

/// Trait for circle fitting on a single labelled region
pub trait CircleEstimator: Send + Sync {
    /// Estimate center, per-axis diameters and radius of `region`
    fn estimate(&self, region: &Region) -> CircleEstimate;
}

/// Contract of the outer parameter search
pub trait BatchOptimizer {
    /// Propose `batch_size` parameter vectors in the normalized `[0, 1]` domain
    fn suggest(&self, observations: &[Observation], batch_size: usize) -> Result<Vec<Vec<f64>>>;
}
