use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::{
    error::Result,
    loss::SampleScore,
    types::DropletRecord,
};

pub fn to_json_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Write `value` as pretty JSON, creating parent directories
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, to_json_string(value)?)?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Flatten the droplet tables of several samples, in sample order
pub fn collect_records(scores: &[SampleScore]) -> Vec<DropletRecord> {
    scores.iter().flat_map(|s| s.records.iter().cloned()).collect()
}
