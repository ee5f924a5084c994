use droplet::{
    algorithms::RotateCropPreprocessor, optimizer::Observation, LossConfig, Pipeline, SampleScore,
    SegmentationConfig,
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Droplet(#[from] droplet::DropletError),
    #[error("Job has no samples")]
    NoSamples,
    #[error("Duplicate sample id '{0}'")]
    DuplicateSample(String),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// One image to score
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Sample {
    pub id: String,
    pub path: PathBuf,
    /// Optional rotation and crop applied before segmentation
    pub crop: Option<RotateCropPreprocessor>,
    /// Normalized process parameters that produced this sample
    pub parameters: Option<Vec<f64>>,
}

/// A batch scoring job
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ScoringJob {
    pub output_dir: PathBuf,
    pub samples: Vec<Sample>,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub loss: LossConfig,
    /// Also write each sample's label map as a 16-bit PNG
    #[serde(default)]
    pub save_label_maps: bool,
}

/// Job file as read from disk; the config tables stay undecoded until they
/// go through the config parsers, so type errors there surface as
/// `InvalidConfiguration`
#[derive(Deserialize)]
struct RawJob<V> {
    output_dir: PathBuf,
    samples: Vec<Sample>,
    segmentation: Option<V>,
    loss: Option<V>,
    #[serde(default)]
    save_label_maps: bool,
}

impl<V> RawJob<V>
where
    V: for<'de> serde::Deserializer<'de>,
{
    fn decode(self) -> Result<ScoringJob, JobError> {
        let segmentation = match self.segmentation {
            Some(table) => SegmentationConfig::from_deserializer(table)?,
            None => SegmentationConfig::default(),
        };
        let loss = match self.loss {
            Some(table) => LossConfig::from_deserializer(table)?,
            None => LossConfig::default(),
        };
        let job = ScoringJob {
            output_dir: self.output_dir,
            samples: self.samples,
            segmentation,
            loss,
            save_label_maps: self.save_label_maps,
        };
        job.validate()?;
        Ok(job)
    }
}

impl ScoringJob {
    /// Load a job from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, JobError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, JobError> {
        let raw: RawJob<toml::Value> = toml::from_str(content)?;
        raw.decode()
    }

    /// Load a job from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, JobError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, JobError> {
        let raw: RawJob<serde_json::Value> = serde_json::from_str(content)?;
        raw.decode()
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, JobError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(JobError::UnsupportedFileFormat),
        }
    }

    pub fn to_toml(&self) -> Result<String, JobError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    pub fn to_json(&self) -> Result<String, JobError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    pub fn validate(&self) -> Result<(), JobError> {
        if self.samples.is_empty() {
            return Err(JobError::NoSamples);
        }
        let mut seen = std::collections::HashSet::new();
        for sample in &self.samples {
            if !seen.insert(sample.id.as_str()) {
                return Err(JobError::DuplicateSample(sample.id.clone()));
            }
        }
        self.segmentation.validate()?;
        self.loss.validate()?;
        Ok(())
    }

    /// Pipeline for one sample: its crop, then the shared segmentation and loss settings
    pub fn pipeline_for(&self, sample: &Sample) -> Result<Pipeline, JobError> {
        let mut builder = Pipeline::builder()
            .with_segmentation(self.segmentation.clone())
            .with_loss(self.loss.clone());
        if let Some(crop) = &sample.crop {
            builder = builder.add_preprocessor(crop.clone());
        }
        Ok(builder.build()?)
    }

    /// Observations for every scored sample that carries parameters
    pub fn observations(&self, scores: &[SampleScore]) -> Result<Vec<Observation>, JobError> {
        let mut observations = Vec::new();
        for score in scores {
            let parameters = self
                .samples
                .iter()
                .find(|s| s.id == score.sample_id)
                .and_then(|s| s.parameters.clone());
            if let Some(parameters) = parameters {
                observations.push(Observation::new(score.sample_id.clone(), parameters, score.total_loss)?);
            }
        }
        Ok(observations)
    }
}
