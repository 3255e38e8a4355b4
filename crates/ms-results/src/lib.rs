//! ms-results: solver result tables and the per-unit result cache.

pub mod hash;
pub mod store;
pub mod table;
pub mod types;

pub use hash::compute_fingerprint;
pub use store::{ResultStore, is_sufficient};
pub use table::{MetricKind, ResultRow, ResultTable};
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed result table: {reason}")]
    Malformed { reason: String },

    #[error("Cache entry not found: {key}")]
    EntryNotFound { key: String },
}
