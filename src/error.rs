//! Error types.
//!
//! - `AnalysisError` is what the library surface returns: invalid input,
//!   failed collaborators (completion service, dataset store).
//! - `AppError` is the binary-facing error carrying a process exit code.
//!
//! Exit codes:
//! - 2: bad input or usage (missing file, missing column, invalid flag)
//! - 3: the data cannot support the requested analysis
//! - 4: an external collaborator failed (HTTP, filesystem store, export file)

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("Column `{0}` not found in dataset.")]
    MissingColumn(String),

    #[error("Column `{name}` must hold {expected} values.")]
    WrongColumnType { name: String, expected: &'static str },

    #[error("Duplicate column name `{0}`.")]
    DuplicateColumn(String),

    #[error("Column `{name}` has {found} rows, expected {expected}.")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Cannot run {operation} on an empty dataset.")]
    EmptyDataset { operation: &'static str },

    #[error("Column `{0}` has no usable values.")]
    NoValues(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Failed to read CSV: {0}")]
    Ingest(String),

    #[error("Text completion failed: {0}")]
    Completion(String),

    #[error("Dataset store error: {0}")]
    Store(String),

    #[error("Failed to write export: {0}")]
    Export(String),
}

impl AnalysisError {
    fn exit_code(&self) -> u8 {
        match self {
            AnalysisError::MissingColumn(_)
            | AnalysisError::WrongColumnType { .. }
            | AnalysisError::DuplicateColumn(_)
            | AnalysisError::LengthMismatch { .. }
            | AnalysisError::InvalidParameter(_)
            | AnalysisError::Ingest(_) => 2,
            AnalysisError::EmptyDataset { .. } | AnalysisError::NoValues(_) => 3,
            AnalysisError::Completion(_) | AnalysisError::Store(_) | AnalysisError::Export(_) => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_errors_map_to_exit_codes() {
        let err: AppError = AnalysisError::MissingColumn("revenue".to_string()).into();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("revenue"));

        let err: AppError = AnalysisError::EmptyDataset { operation: "trend analysis" }.into();
        assert_eq!(err.exit_code(), 3);

        let err: AppError = AnalysisError::Completion("timeout".to_string()).into();
        assert_eq!(err.exit_code(), 4);

        let err: AppError = AnalysisError::Export("disk full".to_string()).into();
        assert_eq!(err.exit_code(), 4);
        assert!(!err.to_string().contains("store"));
    }
}
