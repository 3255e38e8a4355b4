//! Shared application service layer for the multigrid convergence study.
//!
//! This crate turns a study configuration into work units, runs them against
//! the result cache and the external solver, and shapes the aggregated
//! tables for reporting. The CLI is a thin layer on top of it.

pub mod cache_service;
pub mod config_service;
pub mod error;
pub mod inventory;
pub mod invoker;
pub mod progress;
pub mod report;
pub mod study_service;

// Re-export key types for convenience
pub use cache_service::{CacheStatus, cache_status, purge_cache};
pub use config_service::{default_config, load_config, save_config};
pub use error::{AppError, AppResult};
pub use inventory::{MeshInventory, enumerate_units, plan_units, scan_inventory};
pub use invoker::{InvokeFailure, ProcessSolver, SolverInvoker};
pub use progress::{StudyProgressEvent, StudyStage};
pub use report::{StudyReport, build_report, summarize, write_report_json};
pub use study_service::{
    CycleResults, SkipReason, StudyOptions, StudyRequest, StudyResponse, StudyResult,
    StudyTimingSummary, UnitOutcome, UnitReport, ensure_study, ensure_study_with_progress,
    run_units,
};
