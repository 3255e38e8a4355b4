//! Error types for the ms-app service layer.

use std::path::PathBuf;

/// Application error type that wraps errors from the backend crates and
/// gives the CLI a single error surface.
///
/// Per-unit solver failures are not errors at this level; they are recorded
/// as skipped units. Only a study that ends with nothing to report fails.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read configuration file: {path}")]
    ConfigFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write configuration file: {path}")]
    ConfigFileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot read mesh folder: {path}")]
    MeshFolder {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Results error: {0}")]
    Results(String),

    #[error("No results to report ({units} units considered, {skipped} skipped)")]
    EmptyStudyResult { units: usize, skipped: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ms-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<ms_project::ProjectError> for AppError {
    fn from(err: ms_project::ProjectError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<ms_project::ValidationError> for AppError {
    fn from(err: ms_project::ValidationError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<ms_core::CoreError> for AppError {
    fn from(err: ms_core::CoreError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<ms_results::ResultsError> for AppError {
    fn from(err: ms_results::ResultsError) -> Self {
        AppError::Results(err.to_string())
    }
}
