use core::fmt;
use std::path::{Path, PathBuf};

use crate::{CoreError, CoreResult, CycleKind};

/// A mesh file taking part in the study, with the refinement depth it must reach.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeshSpec {
    /// Mesh identifier: the file name without its extension.
    pub name: String,
    /// File name as it appears in the inventory folder (e.g. `cube.msh`).
    pub file_name: String,
    pub path: PathBuf,
    pub target_refinement: u32,
}

impl MeshSpec {
    pub fn new(path: impl Into<PathBuf>, target_refinement: u32) -> CoreResult<Self> {
        let path = path.into();
        if target_refinement == 0 {
            return Err(CoreError::InvalidArg {
                what: "target refinement must be positive",
            });
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CoreError::InvalidMeshFile {
                file_name: path.display().to_string(),
            })?;
        let name = mesh_name(&file_name)?;

        Ok(Self {
            name,
            file_name,
            path,
            target_refinement,
        })
    }
}

/// Mesh identifier for an inventory file name (`ball_hole.msh` -> `ball_hole`).
pub fn mesh_name(file_name: &str) -> CoreResult<String> {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CoreError::InvalidMeshFile {
            file_name: file_name.to_string(),
        })
}

/// Stable cache key of a work unit.
///
/// Derived from the mesh identifier and cycle only, never from the
/// refinement, so a changed target shows up as a stale entry under the same key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitKey(String);

impl UnitKey {
    pub fn new(mesh_name: &str, cycle: CycleKind) -> Self {
        Self(format!("{}_{}", mesh_name, cycle.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One (mesh, cycle) pair of the study.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkUnit {
    pub mesh: MeshSpec,
    pub cycle: CycleKind,
}

impl WorkUnit {
    pub fn new(mesh: MeshSpec, cycle: CycleKind) -> Self {
        Self { mesh, cycle }
    }

    pub fn key(&self) -> UnitKey {
        UnitKey::new(&self.mesh.name, self.cycle)
    }

    pub fn mesh_name(&self) -> &str {
        &self.mesh.name
    }

    pub fn target_refinement(&self) -> u32 {
        self.mesh.target_refinement
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}-cycle, refs={})",
            self.mesh.file_name, self.cycle, self.mesh.target_refinement
        )
    }
}
