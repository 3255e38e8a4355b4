//! Mesh inventory scan and work unit enumeration.

use std::path::PathBuf;

use ms_core::{CycleKind, MeshSpec, WorkUnit};
use ms_project::StudyConfig;

use crate::error::{AppError, AppResult};

/// Meshes found in the inventory folder, split by whether the study configures them.
#[derive(Debug, Clone, Default)]
pub struct MeshInventory {
    /// Configured meshes present on disk, in scan order.
    pub meshes: Vec<MeshSpec>,
    /// Mesh files on disk with no configuration entry.
    pub unconfigured: Vec<PathBuf>,
    /// Configured file names with no file on disk.
    pub missing: Vec<String>,
}

/// Scan `config.mesh_folder` for mesh files.
///
/// Files are grouped by extension in the configured order and sorted by name
/// within each group. Only files named in `config.meshes` become study meshes.
pub fn scan_inventory(config: &StudyConfig) -> AppResult<MeshInventory> {
    let folder = &config.mesh_folder;
    let mesh_folder_err = |source: std::io::Error| AppError::MeshFolder {
        path: folder.clone(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder).map_err(mesh_folder_err)? {
        let path = entry.map_err(mesh_folder_err)?.path();
        if path.is_file() {
            files.push(path);
        }
    }

    let mut inventory = MeshInventory::default();
    let mut seen = Vec::new();

    for ext in &config.mesh_extensions {
        let mut group: Vec<&PathBuf> = files
            .iter()
            .filter(|p| p.extension().is_some_and(|e| e == ext.as_str()))
            .collect();
        group.sort();

        for path in group {
            let file_name = match path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };
            if seen.contains(&file_name) {
                continue;
            }

            match config.target_refinement(&file_name) {
                Some(target) => {
                    inventory.meshes.push(MeshSpec::new(path.clone(), target)?);
                    seen.push(file_name);
                }
                None => {
                    tracing::debug!(mesh = %file_name, "skipping mesh without configuration entry");
                    inventory.unconfigured.push(path.clone());
                }
            }
        }
    }

    for file_name in config.meshes.keys() {
        if !seen.contains(file_name) {
            tracing::warn!(
                mesh = %file_name,
                folder = %folder.display(),
                "configured mesh not found in inventory"
            );
            inventory.missing.push(file_name.clone());
        }
    }

    Ok(inventory)
}

/// One unit per (mesh, cycle) pair: cycles in the outer loop, meshes inner.
pub fn enumerate_units(meshes: &[MeshSpec], cycles: &[CycleKind]) -> Vec<WorkUnit> {
    cycles
        .iter()
        .flat_map(|&cycle| {
            meshes
                .iter()
                .map(move |mesh| WorkUnit::new(mesh.clone(), cycle))
        })
        .collect()
}

/// Scan the inventory and enumerate the study's work units.
pub fn plan_units(config: &StudyConfig) -> AppResult<Vec<WorkUnit>> {
    let inventory = scan_inventory(config)?;
    Ok(enumerate_units(&inventory.meshes, &config.cycles))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_are_the_outer_loop() {
        let meshes = vec![
            MeshSpec::new("m/a.msh", 2).unwrap(),
            MeshSpec::new("m/b.msh", 3).unwrap(),
        ];
        let units = enumerate_units(&meshes, &[CycleKind::V, CycleKind::W]);
        let keys: Vec<String> = units.iter().map(|u| u.key().to_string()).collect();
        assert_eq!(keys, vec!["a_V", "b_V", "a_W", "b_W"]);
        assert_eq!(units[3].target_refinement(), 3);
    }

    #[test]
    fn no_meshes_no_units() {
        assert!(enumerate_units(&[], &CycleKind::ALL).is_empty());
    }
}
