//! Content-based fingerprint of the solver configuration behind a cache entry.

use ms_core::WorkUnit;
use ms_project::SolverSettings;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Everything that changes solver output except the refinement count, which
/// the sufficiency rule handles separately.
#[derive(Serialize)]
struct FingerprintInput<'a> {
    mesh_file: &'a str,
    cycle: &'a str,
    executable: String,
    nev: u32,
    gmres_runs: u32,
    eval_tol: f64,
    gmres_tol: f64,
    extra_args: &'a [String],
}

pub fn compute_fingerprint(unit: &WorkUnit, solver: &SolverSettings) -> String {
    let input = FingerprintInput {
        mesh_file: &unit.mesh.file_name,
        cycle: unit.cycle.as_str(),
        executable: solver.executable.to_string_lossy().into_owned(),
        nev: solver.nev,
        gmres_runs: solver.gmres_runs,
        eval_tol: solver.eval_tol,
        gmres_tol: solver.gmres_tol,
        extra_args: &solver.extra_args,
    };

    let mut hasher = Sha256::new();
    let input_json = serde_json::to_string(&input).unwrap_or_default();
    hasher.update(input_json.as_bytes());

    let result = hasher.finalize();
    format!("{:x}", result)
}
