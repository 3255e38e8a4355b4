//! Study configuration loading, saving, and validation.

use std::path::Path;

use ms_project::StudyConfig;

use crate::error::{AppError, AppResult};

/// Load a study configuration from YAML and anchor its relative paths at the
/// directory containing the file.
pub fn load_config(path: &Path) -> AppResult<StudyConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::ConfigFileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: StudyConfig = serde_yaml::from_str(&content)
        .map_err(|e| AppError::Config(format!("Failed to parse study YAML: {}", e)))?;
    ms_project::validate_config(&config)?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(config.resolve_paths(base))
}

/// Configuration used when no file is given: the reference study, with paths
/// relative to the working directory.
pub fn default_config() -> StudyConfig {
    StudyConfig::default()
}

/// Save a study configuration as YAML.
pub fn save_config(path: &Path, config: &StudyConfig) -> AppResult<()> {
    ms_project::validate_config(config)?;
    let content = serde_yaml::to_string(config)
        .map_err(|e| AppError::Config(format!("Failed to serialize study config: {}", e)))?;

    std::fs::write(path, content).map_err(|e| AppError::ConfigFileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}
