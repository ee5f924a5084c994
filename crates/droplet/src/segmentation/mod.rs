pub mod cleanup;
pub mod double_fold;
pub mod single_fold;

pub use cleanup::*;
pub use double_fold::*;
pub use single_fold::*;

use image::RgbImage;

use crate::{config::SegmentationConfig, error::Result, traits::Segmenter, types::LabelMap};

/// Watershed segmenter driven by a validated [`SegmentationConfig`]
#[derive(Debug, Clone, Default)]
pub struct WatershedSegmenter {
    config: SegmentationConfig,
}

impl WatershedSegmenter {
    pub fn new(config: SegmentationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Run the double fold and keep every intermediate decision
    pub fn segment_detailed(&self, image: &RgbImage) -> Result<DoubleFoldReport> {
        double_fold_segment(image, &self.config)
    }
}

impl Segmenter for WatershedSegmenter {
    fn segment(&self, image: &RgbImage) -> Result<LabelMap> {
        watershed_segment(image, &self.config)
    }
}
