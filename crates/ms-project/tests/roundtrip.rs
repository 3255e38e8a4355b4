use std::path::PathBuf;

use ms_core::CycleKind;
use ms_project::{ProjectError, StudyConfig, load_json, load_yaml, save_yaml};

#[test]
fn roundtrip_yaml_default_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("study.yaml");

    let config = StudyConfig::default();
    save_yaml(&path, &config).unwrap();
    let loaded = load_yaml(&path).unwrap();

    assert_eq!(config, loaded);
}

#[test]
fn roundtrip_yaml_custom_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("study.yaml");

    let mut config = StudyConfig::default();
    config.meshes.clear();
    config.meshes.insert("a.msh".to_string(), 3);
    config.meshes.insert("b.mesh".to_string(), 5);
    config.cycles = vec![CycleKind::W];
    config.solver.executable = PathBuf::from("/opt/solver/mgconvergence");
    config.solver.extra_args = vec!["--verbose".to_string()];
    config.solver.scratch_dir = Some(PathBuf::from("scratch"));
    config.cache.require_matching_fingerprint = true;

    save_yaml(&path, &config).unwrap();
    let loaded = load_yaml(&path).unwrap();

    assert_eq!(config, loaded);
}

#[test]
fn load_yaml_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("study.yaml");
    std::fs::write(
        &path,
        "version: 1\nsolver:\n  executable: solver\nmeshes:\n  cube.msh: 0\n",
    )
    .unwrap();

    let err = load_yaml(&path).unwrap_err();
    assert!(matches!(err, ProjectError::Validation(_)));
}

#[test]
fn load_yaml_rejects_unknown_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("study.yaml");
    std::fs::write(
        &path,
        "version: 1\ncycles: [V, F]\nsolver:\n  executable: solver\n",
    )
    .unwrap();

    assert!(matches!(load_yaml(&path), Err(ProjectError::Yaml(_))));
}

#[test]
fn load_json_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("study.json");
    std::fs::write(
        &path,
        r#"{"version": 1, "solver": {"executable": "solver", "nev": 1}, "meshes": {"cube.msh": 2}}"#,
    )
    .unwrap();

    let config = load_json(&path).unwrap();
    assert_eq!(config.solver.nev, 1);
    assert_eq!(config.target_refinement("cube.msh"), Some(2));
}
