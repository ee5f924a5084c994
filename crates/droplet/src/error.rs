use thiserror::Error;

#[derive(Error, Debug)]
pub enum DropletError {
    /// Malformed or empty raster/mask handed to a primitive
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unsupported value for the fold mode or another enumerated option
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Geometric loss requested on a label map without foreground regions
    #[error("Segmentation produced no droplet regions")]
    EmptySegmentation,

    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DropletError {
    pub(crate) fn dimension_mismatch(expected: (u32, u32), actual: (u32, u32)) -> Self {
        Self::InvalidInput(format!(
            "dimension mismatch: expected {}x{}, got {}x{}",
            expected.0, expected.1, actual.0, actual.1
        ))
    }
}

pub type Result<T> = std::result::Result<T, DropletError>;
