//! External solver invocation.

use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};

use ms_core::{UnitKey, WorkUnit};
use ms_project::SolverSettings;
use ms_results::ResultTable;

const SCRATCH_PREFIX: &str = "ms-solve-";
const OUTPUT_FILE: &str = "result.csv";

/// Why a single unit produced no table. Never fatal to the study.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeFailure {
    /// The solver could not be started or exited unsuccessfully.
    /// `exit_code` is `None` when it never ran or was killed by a signal.
    Invocation {
        unit: UnitKey,
        exit_code: Option<i32>,
        detail: Option<String>,
    },
    /// The solver exited cleanly but left no usable table behind.
    MissingOutput { unit: UnitKey, reason: String },
}

impl InvokeFailure {
    pub fn unit(&self) -> &UnitKey {
        match self {
            Self::Invocation { unit, .. } | Self::MissingOutput { unit, .. } => unit,
        }
    }
}

impl fmt::Display for InvokeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invocation {
                unit,
                exit_code,
                detail,
            } => {
                match exit_code {
                    Some(code) => write!(f, "Solver failed for {}: return code {}", unit, code)?,
                    None => write!(f, "Solver failed for {}: no return code", unit)?,
                }
                if let Some(detail) = detail {
                    write!(f, " ({})", detail)?;
                }
                Ok(())
            }
            Self::MissingOutput { unit, reason } => {
                write!(f, "No output generated for {}: {}", unit, reason)
            }
        }
    }
}

impl std::error::Error for InvokeFailure {}

/// Runs the solver for one work unit.
pub trait SolverInvoker {
    fn invoke(
        &mut self,
        unit: &WorkUnit,
        target_refinement: u32,
    ) -> Result<ResultTable, InvokeFailure>;

    /// Short identification recorded in cache manifests.
    fn describe(&self) -> String {
        "solver".to_string()
    }
}

/// Invokes the solver executable as a child process, one blocking call per unit.
#[derive(Debug, Clone)]
pub struct ProcessSolver {
    settings: SolverSettings,
}

impl ProcessSolver {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Command line for one unit, writing its table to `output`.
    pub fn command(&self, unit: &WorkUnit, target_refinement: u32, output: &Path) -> Command {
        let s = &self.settings;
        let mut cmd = Command::new(&s.executable);
        cmd.arg("--mesh")
            .arg(&unit.mesh.path)
            .arg("--refinements")
            .arg(target_refinement.to_string())
            .arg("--output")
            .arg(output)
            .arg("--nev")
            .arg(s.nev.to_string())
            .arg("--gmres")
            .arg(s.gmres_runs.to_string())
            .arg("--eval_tol")
            .arg(s.eval_tol.to_string())
            .arg("--gmres_tol")
            .arg(s.gmres_tol.to_string())
            .arg("--cycle")
            .arg(unit.cycle.as_str())
            .args(&s.extra_args);
        cmd
    }

    fn scratch_dir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        match &self.settings.scratch_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        }
    }
}

impl SolverInvoker for ProcessSolver {
    fn invoke(
        &mut self,
        unit: &WorkUnit,
        target_refinement: u32,
    ) -> Result<ResultTable, InvokeFailure> {
        let key = unit.key();

        // Removed on drop, whichever way this returns.
        let scratch = self.scratch_dir().map_err(|e| InvokeFailure::Invocation {
            unit: key.clone(),
            exit_code: None,
            detail: Some(format!("cannot create scratch directory: {}", e)),
        })?;
        let output = scratch.path().join(OUTPUT_FILE);

        let mut cmd = self.command(unit, target_refinement, &output);
        cmd.stdin(Stdio::null());
        if !self.settings.echo_output {
            cmd.stdout(Stdio::null());
        }

        tracing::debug!(unit = %key, command = ?cmd, "starting solver");
        let status = cmd.status().map_err(|e| InvokeFailure::Invocation {
            unit: key.clone(),
            exit_code: None,
            detail: Some(format!(
                "cannot start {}: {}",
                self.settings.executable.display(),
                e
            )),
        })?;

        if !status.success() {
            return Err(InvokeFailure::Invocation {
                unit: key,
                exit_code: status.code(),
                detail: None,
            });
        }

        let content = std::fs::read_to_string(&output).map_err(|e| InvokeFailure::MissingOutput {
            unit: key.clone(),
            reason: format!("cannot read {}: {}", OUTPUT_FILE, e),
        })?;
        let table = ResultTable::parse_csv(&content).map_err(|e| InvokeFailure::MissingOutput {
            unit: key.clone(),
            reason: e.to_string(),
        })?;
        if table.is_empty() {
            return Err(InvokeFailure::MissingOutput {
                unit: key,
                reason: "output table has no rows".to_string(),
            });
        }

        if let Some(max) = table.max_refinement()
            && max < target_refinement
        {
            tracing::warn!(
                unit = %key,
                max_refinement = max,
                target_refinement,
                "solver stopped short of the requested refinement"
            );
        }

        Ok(table)
    }

    fn describe(&self) -> String {
        self.settings.executable.display().to_string()
    }
}
