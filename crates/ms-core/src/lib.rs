//! ms-core: stable foundation for the multigrid convergence study.
//!
//! Contains:
//! - cycle (multigrid cycle variants and their command line tokens)
//! - unit (mesh specs, work units, stable unit keys)
//! - error (shared error types)

pub mod cycle;
pub mod error;
pub mod unit;

pub use cycle::CycleKind;
pub use error::{CoreError, CoreResult};
pub use unit::{MeshSpec, UnitKey, WorkUnit, mesh_name};
