//! Data handed to an outer batch optimizer.
//!
//! The optimizer itself lives outside this crate; it receives fully observed
//! `(parameters, loss)` pairs and proposes the next batch through
//! [`BatchOptimizer`](crate::traits::BatchOptimizer).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{DropletError, Result};

/// One evaluated parameter vector, normalized to `[0, 1]` per dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Observation {
    pub sample_id: String,
    pub parameters: Vec<f64>,
    /// Total loss of the sample; lower is better
    pub loss: f64,
}

impl Observation {
    pub fn new(sample_id: impl Into<String>, parameters: Vec<f64>, loss: f64) -> Result<Self> {
        let observation = Self { sample_id: sample_id.into(), parameters, loss };
        observation.validate()?;
        Ok(observation)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(p) = self.parameters.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(DropletError::InvalidInput(format!(
                "parameter {p} of sample {} is outside [0, 1]",
                self.sample_id
            )));
        }
        if !self.loss.is_finite() {
            return Err(DropletError::InvalidInput(format!("loss of sample {} is not finite", self.sample_id)));
        }
        Ok(())
    }
}

/// Check every observation and that they share one dimensionality; returns it
pub fn validate_observations(observations: &[Observation]) -> Result<usize> {
    let Some(first) = observations.first() else {
        return Err(DropletError::InvalidInput("no observations".to_string()));
    };
    let dims = first.parameters.len();
    for observation in observations {
        observation.validate()?;
        if observation.parameters.len() != dims {
            return Err(DropletError::InvalidInput(format!(
                "sample {} has {} parameters, expected {dims}",
                observation.sample_id,
                observation.parameters.len()
            )));
        }
    }
    Ok(dims)
}
