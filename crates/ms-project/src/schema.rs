//! Study configuration schema.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ms_core::CycleKind;
use serde::{Deserialize, Serialize};

pub const LATEST_VERSION: u32 = 1;

/// Immutable description of one convergence study.
///
/// `meshes` maps inventory file names (`cube.msh`) to the refinement depth the
/// solver must reach for that mesh. Files in `mesh_folder` without an entry
/// here are not part of the study.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudyConfig {
    pub version: u32,
    #[serde(default = "default_mesh_folder")]
    pub mesh_folder: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_mesh_extensions")]
    pub mesh_extensions: Vec<String>,
    #[serde(default = "default_cycles")]
    pub cycles: Vec<CycleKind>,
    #[serde(default)]
    pub solver: SolverSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub meshes: BTreeMap<String, u32>,
}

/// Fixed arguments handed to every solver invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SolverSettings {
    pub executable: PathBuf,
    /// Number of error-operator eigenvalues to compute (0 skips them).
    #[serde(default = "default_nev")]
    pub nev: u32,
    /// Number of random right-hand sides for the GMRES statistics.
    #[serde(default = "default_gmres_runs")]
    pub gmres_runs: u32,
    #[serde(default = "default_eval_tol")]
    pub eval_tol: f64,
    #[serde(default = "default_gmres_tol")]
    pub gmres_tol: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,
    #[serde(default = "default_true")]
    pub echo_output: bool,
    /// Parent directory for per-invocation scratch output. System temp dir when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CacheSettings {
    /// Reject cache entries whose recorded configuration fingerprint differs
    /// from the current one, in addition to the refinement check.
    #[serde(default)]
    pub require_matching_fingerprint: bool,
}

fn default_mesh_folder() -> PathBuf {
    PathBuf::from("meshes")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_mesh_extensions() -> Vec<String> {
    vec!["msh".to_string(), "mesh".to_string()]
}

fn default_cycles() -> Vec<CycleKind> {
    CycleKind::ALL.to_vec()
}

fn default_nev() -> u32 {
    2
}

fn default_gmres_runs() -> u32 {
    8
}

fn default_eval_tol() -> f64 {
    1e-4
}

fn default_gmres_tol() -> f64 {
    1e-6
}

fn default_true() -> bool {
    true
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("../release/mgconvergence"),
            nev: default_nev(),
            gmres_runs: default_gmres_runs(),
            eval_tol: default_eval_tol(),
            gmres_tol: default_gmres_tol(),
            extra_args: Vec::new(),
            echo_output: true,
            scratch_dir: None,
        }
    }
}

impl Default for StudyConfig {
    fn default() -> Self {
        let meshes = [
            "cube.msh",
            "ball.msh",
            "ball_hole.msh",
            "corner.msh",
            "corner_structured.msh",
            "cylinder.msh",
        ]
        .into_iter()
        .map(|name| (name.to_string(), 4))
        .collect();

        Self {
            version: LATEST_VERSION,
            mesh_folder: default_mesh_folder(),
            output_dir: default_output_dir(),
            mesh_extensions: default_mesh_extensions(),
            cycles: default_cycles(),
            solver: SolverSettings::default(),
            cache: CacheSettings::default(),
            meshes,
        }
    }
}

impl StudyConfig {
    /// Target refinement for an inventory file name, if configured.
    pub fn target_refinement(&self, file_name: &str) -> Option<u32> {
        self.meshes.get(file_name).copied()
    }

    /// Anchor relative paths at `base` (normally the directory holding the
    /// config file). A bare executable name is left alone for `PATH` lookup.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        let anchor = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };

        self.mesh_folder = anchor(self.mesh_folder);
        self.output_dir = anchor(self.output_dir);
        if self.solver.executable.components().count() > 1 {
            self.solver.executable = anchor(self.solver.executable);
        }
        self.solver.scratch_dir = self.solver.scratch_dir.map(anchor);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_reference_study() {
        let config = StudyConfig::default();
        assert_eq!(config.meshes.len(), 6);
        assert!(config.meshes.values().all(|&r| r == 4));
        assert_eq!(config.cycles, vec![CycleKind::V, CycleKind::W]);
        assert_eq!(config.solver.nev, 2);
        assert_eq!(config.solver.gmres_runs, 8);
    }

    #[test]
    fn resolve_keeps_bare_executable() {
        let mut config = StudyConfig::default();
        config.solver.executable = PathBuf::from("mgconvergence");
        let resolved = config.resolve_paths(Path::new("/study"));
        assert_eq!(resolved.solver.executable, PathBuf::from("mgconvergence"));
        assert_eq!(resolved.mesh_folder, PathBuf::from("/study/meshes"));
        assert_eq!(resolved.output_dir, PathBuf::from("/study/results"));
    }

    #[test]
    fn resolve_anchors_relative_executable() {
        let resolved = StudyConfig::default().resolve_paths(Path::new("/study"));
        assert_eq!(
            resolved.solver.executable,
            PathBuf::from("/study/../release/mgconvergence")
        );
    }

    #[test]
    fn minimal_yaml_uses_defaults() {
        let yaml = "version: 1\nsolver:\n  executable: solver\nmeshes:\n  cube.msh: 3\n";
        let config: StudyConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.target_refinement("cube.msh"), Some(3));
        assert_eq!(config.target_refinement("ball.msh"), None);
        assert_eq!(config.mesh_extensions, vec!["msh", "mesh"]);
        assert_eq!(config.solver.gmres_tol, 1e-6);
        assert!(config.solver.echo_output);
    }
}
