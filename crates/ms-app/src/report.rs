//! Plot-ready data extracted from a study result.
//!
//! Each cycle becomes one panel holding a convergence-factor series and a
//! GMRES-iteration series per mesh, both plotted against the DOF count.

use std::path::Path;

use ms_core::CycleKind;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::study_service::StudyResult;

pub const CONVERGENCE_COLUMN: &str = "AbsEval1";
pub const CONVERGENCE_FALLBACK_COLUMN: &str = "AbsEval0";
pub const GMRES_COLUMN: &str = "AvgGMRES";

#[derive(Debug, Clone, Serialize)]
pub struct SeriesData {
    pub mesh: String,
    pub column: String,
    /// True when the preferred column was absent and a fallback was used.
    pub fallback: bool,
    /// `(DOFs, value)` in refinement order.
    pub points: Vec<(u64, f64)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CyclePanel {
    pub cycle: CycleKind,
    pub has_data: bool,
    pub convergence: Vec<SeriesData>,
    pub gmres: Vec<SeriesData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudyReport {
    pub panels: Vec<CyclePanel>,
}

/// Summary of one table for console listings.
#[derive(Debug, Clone)]
pub struct TableSummary {
    pub cycle: CycleKind,
    pub mesh: String,
    pub rows: usize,
    pub max_refinement: Option<u32>,
    pub finest_dofs: Option<u64>,
    pub finest_convergence: Option<f64>,
    pub finest_gmres: Option<f64>,
}

pub fn build_report(result: &StudyResult) -> StudyReport {
    let panels = result
        .iter()
        .map(|(cycle, tables)| {
            let mut convergence = Vec::new();
            let mut gmres = Vec::new();

            for named in tables.iter() {
                let table = &named.table;

                if let Some(points) = table.series(CONVERGENCE_COLUMN) {
                    convergence.push(SeriesData {
                        mesh: named.mesh.clone(),
                        column: CONVERGENCE_COLUMN.to_string(),
                        fallback: false,
                        points,
                    });
                } else if let Some(points) = table.series(CONVERGENCE_FALLBACK_COLUMN) {
                    tracing::warn!(
                        cycle = %cycle,
                        mesh = %named.mesh,
                        "'{}' not found, using '{}'",
                        CONVERGENCE_COLUMN,
                        CONVERGENCE_FALLBACK_COLUMN
                    );
                    convergence.push(SeriesData {
                        mesh: named.mesh.clone(),
                        column: CONVERGENCE_FALLBACK_COLUMN.to_string(),
                        fallback: true,
                        points,
                    });
                }

                if let Some(points) = table.series(GMRES_COLUMN) {
                    gmres.push(SeriesData {
                        mesh: named.mesh.clone(),
                        column: GMRES_COLUMN.to_string(),
                        fallback: false,
                        points,
                    });
                }
            }

            CyclePanel {
                cycle,
                has_data: !tables.is_empty(),
                convergence,
                gmres,
            }
        })
        .collect();

    StudyReport { panels }
}

pub fn summarize(result: &StudyResult) -> Vec<TableSummary> {
    let mut summaries = Vec::new();
    for (cycle, tables) in result.iter() {
        for named in tables.iter() {
            let table = &named.table;
            let last_of = |column: &str| {
                table
                    .series(column)
                    .and_then(|points| points.last().map(|&(_, v)| v))
            };

            summaries.push(TableSummary {
                cycle,
                mesh: named.mesh.clone(),
                rows: table.len(),
                max_refinement: table.max_refinement(),
                finest_dofs: table.rows().last().map(|r| r.dofs),
                finest_convergence: last_of(CONVERGENCE_COLUMN)
                    .or_else(|| last_of(CONVERGENCE_FALLBACK_COLUMN)),
                finest_gmres: last_of(GMRES_COLUMN),
            });
        }
    }
    summaries
}

/// Write the report as pretty JSON for an external plotting step.
pub fn write_report_json(report: &StudyReport, path: &Path) -> AppResult<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| AppError::Results(format!("Failed to serialize report: {}", e)))?;
    std::fs::write(path, json)?;
    Ok(())
}
