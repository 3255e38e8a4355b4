//! Cache metadata types.

use std::path::PathBuf;

use ms_core::{CycleKind, UnitKey, WorkUnit};
use serde::{Deserialize, Serialize};

use crate::table::ResultTable;

/// Sidecar record written next to every cached table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheManifest {
    pub unit_key: String,
    pub mesh: String,
    pub cycle: CycleKind,
    /// Refinement count the solver was asked for.
    pub target_refinement: u32,
    /// Deepest refinement actually present in the table.
    pub max_refinement: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub timestamp: String,
    pub solver: String,
}

impl CacheManifest {
    pub fn new(
        unit: &WorkUnit,
        table: &ResultTable,
        fingerprint: Option<String>,
        solver: &str,
    ) -> Self {
        Self {
            unit_key: unit.key().to_string(),
            mesh: unit.mesh.name.clone(),
            cycle: unit.cycle,
            target_refinement: unit.target_refinement(),
            max_refinement: table.max_refinement().unwrap_or(0),
            fingerprint,
            timestamp: chrono::Utc::now().to_rfc3339(),
            solver: solver.to_string(),
        }
    }

    pub fn key(&self) -> UnitKey {
        UnitKey::new(&self.mesh, self.cycle)
    }
}

/// One cached unit as seen by a directory listing.
#[derive(Debug, Clone)]
pub struct CacheEntrySummary {
    pub unit_key: String,
    pub table_path: PathBuf,
    /// `None` when the table could not be read.
    pub rows: Option<usize>,
    pub max_refinement: Option<u32>,
    pub manifest: Option<CacheManifest>,
}

/// Outcome of a bulk purge. Individual failures do not stop the purge.
#[derive(Debug, Clone, Default)]
pub struct PurgeReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl PurgeReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
