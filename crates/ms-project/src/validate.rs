//! Study configuration validation.

use std::collections::{HashMap, HashSet};

use crate::schema::{LATEST_VERSION, StudyConfig};

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing value: {field}")]
    Missing { field: String },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_config(config: &StudyConfig) -> Result<(), ValidationError> {
    if config.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: config.version,
        });
    }

    if config.cycles.is_empty() {
        return Err(ValidationError::Missing {
            field: "cycles".to_string(),
        });
    }
    let mut seen_cycles = HashSet::new();
    for cycle in &config.cycles {
        if !seen_cycles.insert(*cycle) {
            return Err(ValidationError::DuplicateId {
                id: cycle.to_string(),
                context: "cycles".to_string(),
            });
        }
    }

    if config.mesh_extensions.is_empty() {
        return Err(ValidationError::Missing {
            field: "mesh_extensions".to_string(),
        });
    }
    let mut seen_extensions = HashSet::new();
    for ext in &config.mesh_extensions {
        if !seen_extensions.insert(ext.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: ext.clone(),
                context: "mesh_extensions".to_string(),
            });
        }
        if ext.is_empty() || ext.starts_with('.') {
            return Err(ValidationError::InvalidValue {
                field: "mesh_extensions".to_string(),
                value: ext.clone(),
                reason: "extension must be non-empty and given without a leading dot"
                    .to_string(),
            });
        }
    }

    validate_meshes(config)?;
    validate_solver(config)?;
    Ok(())
}

fn validate_meshes(config: &StudyConfig) -> Result<(), ValidationError> {
    // Two files with the same stem would share a cache key.
    let mut by_name: HashMap<String, &str> = HashMap::new();

    for (file_name, &refinements) in &config.meshes {
        if refinements == 0 {
            return Err(ValidationError::InvalidValue {
                field: format!("meshes.{}", file_name),
                value: refinements.to_string(),
                reason: "refinement count must be positive".to_string(),
            });
        }

        let name = ms_core::mesh_name(file_name).map_err(|e| ValidationError::InvalidValue {
            field: "meshes".to_string(),
            value: file_name.clone(),
            reason: e.to_string(),
        })?;

        if let Some(other) = by_name.insert(name.clone(), file_name) {
            return Err(ValidationError::DuplicateId {
                id: name,
                context: format!("meshes ({} and {})", other, file_name),
            });
        }
    }

    Ok(())
}

fn validate_solver(config: &StudyConfig) -> Result<(), ValidationError> {
    let solver = &config.solver;

    if solver.executable.as_os_str().is_empty() {
        return Err(ValidationError::Missing {
            field: "solver.executable".to_string(),
        });
    }

    for (field, value) in [
        ("solver.eval_tol", solver.eval_tol),
        ("solver.gmres_tol", solver.gmres_tol),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(ValidationError::InvalidValue {
                field: field.to_string(),
                value: value.to_string(),
                reason: "tolerance must be finite and positive".to_string(),
            });
        }
    }

    Ok(())
}
