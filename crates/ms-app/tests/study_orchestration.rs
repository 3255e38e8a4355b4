//! Cache reuse, failure isolation, and forced re-run behavior of the study runner.

use std::collections::HashSet;
use std::fs;

use ms_app::{
    AppError, InvokeFailure, SkipReason, SolverInvoker, StudyOptions, StudyProgressEvent,
    StudyStage, UnitOutcome, run_units,
};
use ms_core::{CycleKind, MeshSpec, WorkUnit};
use ms_project::StudyConfig;
use ms_results::{ResultRow, ResultStore, ResultTable};

/// In-memory solver: records every call and fails on request.
#[derive(Default)]
struct ScriptedSolver {
    calls: Vec<(String, u32)>,
    fail: HashSet<String>,
    no_output: HashSet<String>,
    /// Added to every DOF count so tables from different runs can be told apart.
    dof_offset: u64,
}

impl ScriptedSolver {
    fn failing(keys: &[&str]) -> Self {
        Self {
            fail: keys.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        }
    }

    fn called_keys(&self) -> Vec<&str> {
        self.calls.iter().map(|(k, _)| k.as_str()).collect()
    }
}

impl SolverInvoker for ScriptedSolver {
    fn invoke(
        &mut self,
        unit: &WorkUnit,
        target_refinement: u32,
    ) -> Result<ResultTable, InvokeFailure> {
        let key = unit.key();
        self.calls.push((key.to_string(), target_refinement));

        if self.fail.contains(key.as_str()) {
            return Err(InvokeFailure::Invocation {
                unit: key,
                exit_code: Some(1),
                detail: None,
            });
        }
        if self.no_output.contains(key.as_str()) {
            return Err(InvokeFailure::MissingOutput {
                unit: key,
                reason: "no output file".to_string(),
            });
        }

        Ok(table_to(target_refinement, self.dof_offset))
    }
}

fn table_to(max_refinement: u32, dof_offset: u64) -> ResultTable {
    let rows = (1..=max_refinement)
        .map(|r| ResultRow {
            refinement: r,
            dofs: 8_u64.pow(r) * 100 + dof_offset,
            metrics: vec![Some(10.0 + r as f64), Some(0.3), Some(0.1 * r as f64)],
        })
        .collect();
    ResultTable::new(
        vec![
            "AvgGMRES".to_string(),
            "AbsEval0".to_string(),
            "AbsEval1".to_string(),
        ],
        rows,
    )
    .unwrap()
}

fn units(meshes: &[(&str, u32)], cycles: &[CycleKind]) -> Vec<WorkUnit> {
    let specs: Vec<MeshSpec> = meshes
        .iter()
        .map(|(name, refs)| MeshSpec::new(format!("meshes/{}.msh", name), *refs).unwrap())
        .collect();
    ms_app::enumerate_units(&specs, cycles)
}

fn config(cycles: &[CycleKind]) -> StudyConfig {
    StudyConfig {
        cycles: cycles.to_vec(),
        ..StudyConfig::default()
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    store: ResultStore,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let store = ResultStore::new(dir.path().join("results"));
    Fixture { _dir: dir, store }
}

const V_ONLY: &[CycleKind] = &[CycleKind::V];

#[test]
fn cold_run_invokes_every_unit_once() {
    let fx = fixture();
    let units = units(&[("A", 3), ("B", 3)], V_ONLY);
    let mut solver = ScriptedSolver::default();

    let response = run_units(
        &units,
        &config(V_ONLY),
        StudyOptions::default(),
        &fx.store,
        &mut solver,
        None,
    )
    .unwrap();

    assert_eq!(solver.called_keys(), vec!["A_V", "B_V"]);
    assert!(solver.calls.iter().all(|(_, refs)| *refs == 3));

    let v = response.result.cycle(CycleKind::V).unwrap();
    assert_eq!(v.mesh_names(), vec!["A", "B"]);
    assert_eq!(response.timing.computed, 2);
    assert_eq!(response.timing.cache_hits, 0);
    assert!(response.purge.is_none());

    // Both results were persisted.
    for unit in &units {
        assert_eq!(fx.store.load(&unit.key()).unwrap().max_refinement(), Some(3));
    }
}

#[test]
fn sufficient_cache_is_reused_without_invocation() {
    let fx = fixture();
    let first = units(&[("A", 3), ("B", 3)], V_ONLY);
    let mut solver = ScriptedSolver::default();
    run_units(&first, &config(V_ONLY), StudyOptions::default(), &fx.store, &mut solver, None)
        .unwrap();

    // Lower target than what is cached: still a hit.
    let second = units(&[("A", 2), ("B", 3)], V_ONLY);
    let mut solver = ScriptedSolver::default();
    let response = run_units(
        &second,
        &config(V_ONLY),
        StudyOptions::default(),
        &fx.store,
        &mut solver,
        None,
    )
    .unwrap();

    assert!(solver.calls.is_empty());
    assert_eq!(response.timing.cache_hits, 2);
    assert!(matches!(
        response.units[0].outcome,
        UnitOutcome::CacheHit { max_refinement: 3 }
    ));
    // The deeper cached table is returned as is.
    assert_eq!(
        response.result.get(CycleKind::V, "A").unwrap().max_refinement(),
        Some(3)
    );
}

#[test]
fn raised_target_reinvokes_only_that_unit() {
    let fx = fixture();
    let mut solver = ScriptedSolver::default();
    run_units(
        &units(&[("A", 3), ("B", 3)], V_ONLY),
        &config(V_ONLY),
        StudyOptions::default(),
        &fx.store,
        &mut solver,
        None,
    )
    .unwrap();

    let mut solver = ScriptedSolver::default();
    let response = run_units(
        &units(&[("A", 4), ("B", 3)], V_ONLY),
        &config(V_ONLY),
        StudyOptions::default(),
        &fx.store,
        &mut solver,
        None,
    )
    .unwrap();

    assert_eq!(solver.calls, vec![("A_V".to_string(), 4)]);
    assert!(matches!(
        response.units[0].outcome,
        UnitOutcome::Computed {
            max_refinement: 4,
            saved: true
        }
    ));
    assert!(matches!(
        response.units[1].outcome,
        UnitOutcome::CacheHit { .. }
    ));

    let v = response.result.cycle(CycleKind::V).unwrap();
    assert_eq!(v.get("A").unwrap().max_refinement(), Some(4));
    assert_eq!(v.get("B").unwrap().max_refinement(), Some(3));
}

#[test]
fn failed_unit_is_excluded_and_study_continues() {
    let fx = fixture();
    let units = units(&[("A", 3), ("B", 3), ("C", 2)], V_ONLY);
    let mut solver = ScriptedSolver::failing(&["B_V"]);

    let response = run_units(
        &units,
        &config(V_ONLY),
        StudyOptions::default(),
        &fx.store,
        &mut solver,
        None,
    )
    .unwrap();

    assert_eq!(solver.called_keys(), vec!["A_V", "B_V", "C_V"]);
    let v = response.result.cycle(CycleKind::V).unwrap();
    assert_eq!(v.mesh_names(), vec!["A", "C"]);
    assert_eq!(response.timing.failed, 1);
    assert!(matches!(
        &response.units[1].outcome,
        UnitOutcome::Skipped(SkipReason::Failed(InvokeFailure::Invocation {
            exit_code: Some(1),
            ..
        }))
    ));
    assert!(!fx.store.has_entry(&units[1].key()));
}

#[test]
fn missing_output_is_treated_like_a_failed_invocation() {
    let fx = fixture();
    let units = units(&[("A", 2), ("B", 2)], &CycleKind::ALL);
    let mut solver = ScriptedSolver {
        no_output: ["A_W".to_string()].into_iter().collect(),
        ..Default::default()
    };

    let response = run_units(
        &units,
        &config(&CycleKind::ALL),
        StudyOptions::default(),
        &fx.store,
        &mut solver,
        None,
    )
    .unwrap();

    assert_eq!(solver.calls.len(), 4);
    assert_eq!(
        response.result.cycle(CycleKind::V).unwrap().mesh_names(),
        vec!["A", "B"]
    );
    assert_eq!(
        response.result.cycle(CycleKind::W).unwrap().mesh_names(),
        vec!["B"]
    );
}

#[test]
fn failed_rerun_leaves_stale_entry_untouched() {
    let fx = fixture();
    let mut solver = ScriptedSolver::default();
    run_units(
        &units(&[("A", 2), ("B", 2)], V_ONLY),
        &config(V_ONLY),
        StudyOptions::default(),
        &fx.store,
        &mut solver,
        None,
    )
    .unwrap();

    // B's cache is now too shallow and its re-run fails.
    let mut solver = ScriptedSolver::failing(&["B_V"]);
    let response = run_units(
        &units(&[("A", 2), ("B", 3)], V_ONLY),
        &config(V_ONLY),
        StudyOptions::default(),
        &fx.store,
        &mut solver,
        None,
    )
    .unwrap();

    assert_eq!(solver.called_keys(), vec!["B_V"]);
    assert_eq!(
        response.result.cycle(CycleKind::V).unwrap().mesh_names(),
        vec!["A"]
    );
    // The stale entry is left in place, untouched.
    assert_eq!(
        fx.store.load(&units(&[("B", 3)], V_ONLY)[0].key()).unwrap().max_refinement(),
        Some(2)
    );
}

#[test]
fn all_units_failing_is_an_empty_study() {
    let fx = fixture();
    let units = units(&[("A", 3), ("B", 3)], V_ONLY);
    let mut solver = ScriptedSolver::failing(&["A_V", "B_V"]);

    let err = run_units(
        &units,
        &config(V_ONLY),
        StudyOptions::default(),
        &fx.store,
        &mut solver,
        None,
    )
    .unwrap_err();

    assert!(matches!(
        err,
        AppError::EmptyStudyResult {
            units: 2,
            skipped: 2
        }
    ));
}

#[test]
fn no_units_is_an_empty_study() {
    let fx = fixture();
    let mut solver = ScriptedSolver::default();
    let err = run_units(
        &[],
        &config(&CycleKind::ALL),
        StudyOptions::default(),
        &fx.store,
        &mut solver,
        None,
    )
    .unwrap_err();
    assert!(matches!(err, AppError::EmptyStudyResult { units: 0, .. }));
}

#[test]
fn forced_rerun_purges_and_reinvokes_everything() {
    let fx = fixture();
    let units = units(&[("A", 3), ("B", 3)], V_ONLY);
    let mut solver = ScriptedSolver::default();
    run_units(&units, &config(V_ONLY), StudyOptions::default(), &fx.store, &mut solver, None)
        .unwrap();
    fs::write(fx.store.root_dir().join("stale_W.csv"), "Refinements,DOFs\n1,1\n").unwrap();

    let mut solver = ScriptedSolver {
        dof_offset: 7,
        ..Default::default()
    };
    let response = run_units(
        &units,
        &config(V_ONLY),
        StudyOptions {
            force: true,
            plot_only: false,
        },
        &fx.store,
        &mut solver,
        None,
    )
    .unwrap();

    assert_eq!(solver.called_keys(), vec!["A_V", "B_V"]);
    let purge = response.purge.expect("purge report");
    assert!(purge.is_clean());
    // Two tables, two manifests, and the unrelated stale table.
    assert_eq!(purge.removed.len(), 5);
    assert!(!fx.store.root_dir().join("stale_W.csv").exists());

    // Every table in the result (and in the store) comes from the new run.
    for unit in &units {
        let table = response.result.get(CycleKind::V, unit.mesh_name()).unwrap();
        assert_eq!(table.rows()[0].dofs, 807);
        assert_eq!(fx.store.load(&unit.key()).unwrap().rows()[0].dofs, 807);
    }
}

#[test]
fn plot_only_never_invokes() {
    let fx = fixture();
    let mut solver = ScriptedSolver::default();
    run_units(
        &units(&[("A", 3)], V_ONLY),
        &config(V_ONLY),
        StudyOptions::default(),
        &fx.store,
        &mut solver,
        None,
    )
    .unwrap();

    // A is cached at 3; B has nothing.
    let study = units(&[("A", 3), ("B", 3)], V_ONLY);
    let mut solver = ScriptedSolver::default();
    let response = run_units(
        &study,
        &config(V_ONLY),
        StudyOptions {
            force: false,
            plot_only: true,
        },
        &fx.store,
        &mut solver,
        None,
    )
    .unwrap();

    assert!(solver.calls.is_empty());
    assert_eq!(
        response.result.cycle(CycleKind::V).unwrap().mesh_names(),
        vec!["A"]
    );
    assert_eq!(
        response.units[1].outcome,
        UnitOutcome::Skipped(SkipReason::PlotOnly)
    );

    let raised = units(&[("A", 4)], V_ONLY);
    let err = run_units(
        &raised,
        &config(V_ONLY),
        StudyOptions {
            force: false,
            plot_only: true,
        },
        &fx.store,
        &mut solver,
        None,
    )
    .unwrap_err();
    assert!(matches!(err, AppError::EmptyStudyResult { .. }));
    assert!(solver.calls.is_empty());
}

#[test]
fn force_with_plot_only_purges_and_reports_nothing() {
    let fx = fixture();
    let units = units(&[("A", 3)], V_ONLY);
    let mut solver = ScriptedSolver::default();
    run_units(&units, &config(V_ONLY), StudyOptions::default(), &fx.store, &mut solver, None)
        .unwrap();

    let mut solver = ScriptedSolver::default();
    let err = run_units(
        &units,
        &config(V_ONLY),
        StudyOptions {
            force: true,
            plot_only: true,
        },
        &fx.store,
        &mut solver,
        None,
    )
    .unwrap_err();

    assert!(matches!(err, AppError::EmptyStudyResult { .. }));
    assert!(solver.calls.is_empty());
    assert!(!fx.store.has_entry(&units[0].key()));
}

#[test]
fn corrupt_cache_entry_is_recomputed() {
    let fx = fixture();
    let units = units(&[("A", 2)], V_ONLY);
    fs::create_dir_all(fx.store.root_dir()).unwrap();
    fs::write(fx.store.table_path(&units[0].key()), "not,a,table\n???\n").unwrap();

    let mut solver = ScriptedSolver::default();
    let response = run_units(
        &units,
        &config(V_ONLY),
        StudyOptions::default(),
        &fx.store,
        &mut solver,
        None,
    )
    .unwrap();

    assert_eq!(solver.called_keys(), vec!["A_V"]);
    assert_eq!(response.result.len(), 1);
    assert_eq!(fx.store.load(&units[0].key()).unwrap().max_refinement(), Some(2));
}

#[test]
fn fingerprint_check_is_opt_in() {
    let fx = fixture();
    let units = units(&[("A", 2)], V_ONLY);
    let mut solver = ScriptedSolver::default();
    run_units(&units, &config(V_ONLY), StudyOptions::default(), &fx.store, &mut solver, None)
        .unwrap();

    let mut changed = config(V_ONLY);
    changed.solver.gmres_tol = 1e-9;

    // Default: only the refinement level decides.
    let mut solver = ScriptedSolver::default();
    run_units(&units, &changed, StudyOptions::default(), &fx.store, &mut solver, None).unwrap();
    assert!(solver.calls.is_empty());

    // Opt in: changed solver settings invalidate the entry.
    changed.cache.require_matching_fingerprint = true;
    let mut solver = ScriptedSolver::default();
    run_units(&units, &changed, StudyOptions::default(), &fx.store, &mut solver, None).unwrap();
    assert_eq!(solver.called_keys(), vec!["A_V"]);

    // The new entry carries the new fingerprint and is reused afterwards.
    let mut solver = ScriptedSolver::default();
    run_units(&units, &changed, StudyOptions::default(), &fx.store, &mut solver, None).unwrap();
    assert!(solver.calls.is_empty());
}

#[test]
fn progress_events_follow_unit_order() {
    let fx = fixture();
    let units = units(&[("A", 2), ("B", 2)], V_ONLY);
    let mut solver = ScriptedSolver::failing(&["B_V"]);
    let mut events: Vec<StudyProgressEvent> = Vec::new();

    run_units(
        &units,
        &config(V_ONLY),
        StudyOptions::default(),
        &fx.store,
        &mut solver,
        Some(&mut |event: StudyProgressEvent| events.push(event)),
    )
    .unwrap();

    let stages: Vec<(StudyStage, Option<String>)> = events
        .iter()
        .map(|e| (e.stage.clone(), e.unit.as_ref().map(|u| u.to_string())))
        .collect();
    let a = Some("A_V".to_string());
    let b = Some("B_V".to_string());
    assert_eq!(
        stages,
        vec![
            (StudyStage::CheckingCache, a.clone()),
            (StudyStage::RunningSolver, a.clone()),
            (StudyStage::SavingResults, a),
            (StudyStage::CheckingCache, b.clone()),
            (StudyStage::RunningSolver, b.clone()),
            (StudyStage::UnitFailed, b),
            (StudyStage::Completed, None),
        ]
    );
    assert!(events.iter().all(|e| e.total == 2));
    assert_eq!(events[4].index, 1);
}
