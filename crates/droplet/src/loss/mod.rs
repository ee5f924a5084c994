pub mod circle;
pub mod geometric;
pub mod yield_loss;

pub use circle::*;
pub use geometric::*;
pub use yield_loss::*;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::LossConfig,
    error::Result,
    traits::CircleEstimator,
    types::{DropletRecord, LabelMap},
};

/// Loss breakdown of one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SampleScore {
    pub sample_id: String,
    pub region_count: usize,
    pub yield_loss: f64,
    pub geometric_loss: f64,
    /// Weighted mean of the yield and geometric losses
    pub total_loss: f64,
    pub records: Vec<DropletRecord>,
}

/// Scores label maps with the yield and geometric losses
pub struct LossScorer {
    config: LossConfig,
    estimator: Box<dyn CircleEstimator>,
}

impl LossScorer {
    /// Scorer with the estimator selected by `config.circle_fit`
    pub fn new(config: LossConfig) -> Result<Self> {
        config.validate()?;
        let estimator = estimator_for(config.circle_fit);
        Ok(Self { config, estimator })
    }

    /// Replace the configured circle estimator
    pub fn with_estimator<E>(self, estimator: E) -> Self
    where
        E: CircleEstimator + 'static,
    {
        self.with_boxed_estimator(Box::new(estimator))
    }

    pub fn with_boxed_estimator(mut self, estimator: Box<dyn CircleEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn config(&self) -> &LossConfig {
        &self.config
    }

    pub fn score(&self, sample_id: &str, labels: &LabelMap) -> Result<SampleScore> {
        let yld = yield_loss(labels, self.config.max_droplets_estimate, self.config.count_slack);
        let geometric = geometric_loss(labels, sample_id, self.estimator.as_ref())?;
        let total_loss = self.config.combine(yld.value, geometric.value);
        debug!(
            sample_id,
            count_loss = yld.count_loss,
            area_loss = yld.area_loss,
            geometric_loss = geometric.value,
            total_loss,
            "sample scored"
        );
        Ok(SampleScore {
            sample_id: sample_id.to_string(),
            region_count: geometric.records.len(),
            yield_loss: yld.value,
            geometric_loss: geometric.value,
            total_loss,
            records: geometric.records,
        })
    }
}

impl Default for LossScorer {
    fn default() -> Self {
        Self { config: LossConfig::default(), estimator: Box::new(MidpointSpanEstimator) }
    }
}
