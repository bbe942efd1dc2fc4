//! Read/write JSON documents (datasets, saved analyses, analysis results).

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::AnalysisError;

/// Write any serializable value as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AnalysisError> {
    let file = File::create(path)
        .map_err(|e| AnalysisError::Store(format!("failed to create '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, value)
        .map_err(|e| AnalysisError::Store(format!("failed to write '{}': {e}", path.display())))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AnalysisError> {
    let file = File::open(path)
        .map_err(|e| AnalysisError::Store(format!("failed to open '{}': {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AnalysisError::Store(format!("invalid JSON in '{}': {e}", path.display())))
}
