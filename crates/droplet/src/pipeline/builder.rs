use crate::{
    algorithms::{InvertPreprocessor, RotateCropPreprocessor},
    config::{LossConfig, SegmentationConfig},
    error::Result,
    loss::LossScorer,
    pipeline::Pipeline,
    segmentation::WatershedSegmenter,
    traits::{CircleEstimator, ImagePreprocessor, Segmenter},
};

/// Builder for creating scoring pipelines with a fluent API
pub struct PipelineBuilder {
    preprocessors: Vec<Box<dyn ImagePreprocessor>>,
    segmenter: Option<Box<dyn Segmenter>>,
    segmentation: SegmentationConfig,
    loss: LossConfig,
    estimator: Option<Box<dyn CircleEstimator>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            preprocessors: Vec::new(),
            segmenter: None,
            segmentation: SegmentationConfig::default(),
            loss: LossConfig::default(),
            estimator: None,
        }
    }

    /// Add a preprocessor to the pipeline
    pub fn add_preprocessor<P>(mut self, preprocessor: P) -> Self
    where
        P: ImagePreprocessor + 'static,
    {
        self.preprocessors.push(Box::new(preprocessor));
        self
    }

    /// Rotate counter-clockwise by `theta_degrees`, then crop to `[x1, x2) × [y1, y2)`
    pub fn with_rotate_crop(self, theta_degrees: f32, x1: u32, x2: u32, y1: u32, y2: u32) -> Self {
        self.add_preprocessor(RotateCropPreprocessor { theta_degrees, x1, x2, y1, y2 })
    }

    pub fn with_inversion(self) -> Self {
        self.add_preprocessor(InvertPreprocessor)
    }

    /// Set the segmenter (replaces the default watershed segmenter)
    pub fn set_segmenter<S>(mut self, segmenter: S) -> Self
    where
        S: Segmenter + 'static,
    {
        self.segmenter = Some(Box::new(segmenter));
        self
    }

    /// Configure the default watershed segmenter
    pub fn with_segmentation(mut self, config: SegmentationConfig) -> Self {
        self.segmentation = config;
        self
    }

    pub fn with_loss(mut self, config: LossConfig) -> Self {
        self.loss = config;
        self
    }

    /// Override the circle estimator chosen by the loss configuration
    pub fn set_circle_estimator<E>(mut self, estimator: E) -> Self
    where
        E: CircleEstimator + 'static,
    {
        self.estimator = Some(Box::new(estimator));
        self
    }

    /// Validate the configurations and assemble the pipeline
    pub fn build(self) -> Result<Pipeline> {
        let segmenter = match self.segmenter {
            Some(segmenter) => segmenter,
            None => Box::new(WatershedSegmenter::new(self.segmentation)?),
        };
        let mut scorer = LossScorer::new(self.loss)?;
        if let Some(estimator) = self.estimator {
            scorer = scorer.with_boxed_estimator(estimator);
        }
        Ok(Pipeline::new(self.preprocessors, segmenter, scorer))
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
