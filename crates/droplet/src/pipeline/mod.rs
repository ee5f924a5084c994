pub mod builder;

use image::RgbImage;
use tracing::debug;

use crate::{
    error::Result,
    loss::{LossScorer, SampleScore},
    traits::{ImagePreprocessor, Segmenter},
    types::LabelMap,
};

/// Label map of a sample together with its score
#[derive(Debug, Clone)]
pub struct ScoredSample {
    pub labels: LabelMap,
    pub score: SampleScore,
}

/// Preprocess, segment and score one raster at a time
pub struct Pipeline {
    preprocessors: Vec<Box<dyn ImagePreprocessor>>,
    segmenter: Box<dyn Segmenter>,
    scorer: LossScorer,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    pub fn new(
        preprocessors: Vec<Box<dyn ImagePreprocessor>>,
        segmenter: Box<dyn Segmenter>,
        scorer: LossScorer,
    ) -> Self {
        Self {
            preprocessors,
            segmenter,
            scorer,
        }
    }

    /// Apply every preprocessor in order
    pub fn preprocess(&self, image: &RgbImage) -> Result<RgbImage> {
        let mut processed = image.clone();
        for preprocessor in &self.preprocessors {
            processed = preprocessor.preprocess(&processed)?;
        }
        Ok(processed)
    }

    /// Preprocess and segment without scoring
    pub fn segment(&self, image: &RgbImage) -> Result<LabelMap> {
        let processed = self.preprocess(image)?;
        self.segmenter.segment(&processed)
    }

    /// Full run; a sample without droplets fails with `EmptySegmentation`
    pub fn process(&self, sample_id: &str, image: &RgbImage) -> Result<ScoredSample> {
        let labels = self.segment(image)?;
        debug!(sample_id, regions = labels.region_count(), "segmented");
        let score = self.scorer.score(sample_id, &labels)?;
        Ok(ScoredSample { labels, score })
    }

    pub fn scorer(&self) -> &LossScorer {
        &self.scorer
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        format!(
            "Pipeline: {} preprocessors, 1 segmenter, circle fit {}",
            self.preprocessors.len(),
            self.scorer.config().circle_fit
        )
    }
}
