//! Study execution and result caching service.

use std::collections::BTreeMap;
use std::time::Instant;

use ms_core::{CycleKind, UnitKey, WorkUnit};
use ms_project::StudyConfig;
use ms_results::{CacheManifest, PurgeReport, ResultStore, ResultTable, is_sufficient};

use crate::error::{AppError, AppResult};
use crate::invoker::{InvokeFailure, ProcessSolver, SolverInvoker};
use crate::inventory;
use crate::progress::{StudyProgressEvent, StudyStage};

/// Control switches owned by the front end.
#[derive(Debug, Clone, Copy, Default)]
pub struct StudyOptions {
    /// Purge every cache entry and recompute all units.
    pub force: bool,
    /// Never invoke the solver; report only what the cache can supply.
    pub plot_only: bool,
}

/// Request to execute a study.
pub struct StudyRequest<'a> {
    pub config: &'a StudyConfig,
    pub options: StudyOptions,
}

/// A mesh's table within one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTable {
    pub mesh: String,
    pub table: ResultTable,
}

/// Tables of one cycle, in the order their units were processed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleResults {
    tables: Vec<NamedTable>,
}

impl CycleResults {
    pub fn get(&self, mesh: &str) -> Option<&ResultTable> {
        self.tables
            .iter()
            .find(|t| t.mesh == mesh)
            .map(|t| &t.table)
    }

    pub fn mesh_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.mesh.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedTable> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn insert(&mut self, mesh: String, table: ResultTable) {
        match self.tables.iter_mut().find(|t| t.mesh == mesh) {
            Some(existing) => existing.table = table,
            None => self.tables.push(NamedTable { mesh, table }),
        }
    }
}

/// Cycle -> mesh -> table for every unit that produced a usable table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudyResult {
    cycles: BTreeMap<CycleKind, CycleResults>,
}

impl StudyResult {
    pub fn new(cycles: &[CycleKind]) -> Self {
        Self {
            cycles: cycles
                .iter()
                .map(|&c| (c, CycleResults::default()))
                .collect(),
        }
    }

    pub fn insert(&mut self, cycle: CycleKind, mesh: impl Into<String>, table: ResultTable) {
        self.cycles
            .entry(cycle)
            .or_default()
            .insert(mesh.into(), table);
    }

    pub fn cycle(&self, cycle: CycleKind) -> Option<&CycleResults> {
        self.cycles.get(&cycle)
    }

    pub fn get(&self, cycle: CycleKind, mesh: &str) -> Option<&ResultTable> {
        self.cycles.get(&cycle).and_then(|c| c.get(mesh))
    }

    pub fn iter(&self) -> impl Iterator<Item = (CycleKind, &CycleResults)> {
        self.cycles.iter().map(|(&c, r)| (c, r))
    }

    /// Total number of tables across all cycles.
    pub fn len(&self) -> usize {
        self.cycles.values().map(CycleResults::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.values().all(CycleResults::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Plot-only mode and the cache had nothing sufficient.
    PlotOnly,
    Failed(InvokeFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    CacheHit { max_refinement: u32 },
    Computed { max_refinement: u32, saved: bool },
    Skipped(SkipReason),
}

impl UnitOutcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, UnitOutcome::Skipped(_))
    }
}

#[derive(Debug, Clone)]
pub struct UnitReport {
    pub unit: UnitKey,
    pub mesh: String,
    pub cycle: CycleKind,
    pub target_refinement: u32,
    pub outcome: UnitOutcome,
}

/// Timing and tally of one study run.
#[derive(Debug, Clone, Default)]
pub struct StudyTimingSummary {
    pub purge_time_s: f64,
    pub cache_time_s: f64,
    pub solve_time_s: f64,
    pub save_time_s: f64,
    pub total_time_s: f64,
    pub cache_hits: usize,
    pub computed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Response from a study execution.
#[derive(Debug, Clone)]
pub struct StudyResponse {
    pub result: StudyResult,
    pub units: Vec<UnitReport>,
    pub purge: Option<PurgeReport>,
    pub timing: StudyTimingSummary,
}

/// Scan the inventory, then execute or load every unit of the study.
pub fn ensure_study(request: &StudyRequest) -> AppResult<StudyResponse> {
    ensure_study_with_progress(request, None)
}

/// Same as [`ensure_study`], streaming progress events.
pub fn ensure_study_with_progress(
    request: &StudyRequest,
    progress_cb: Option<&mut dyn FnMut(StudyProgressEvent)>,
) -> AppResult<StudyResponse> {
    let units = inventory::plan_units(request.config)?;
    let store = ResultStore::new(request.config.output_dir.clone());
    let mut solver = ProcessSolver::new(request.config.solver.clone());

    run_units(
        &units,
        request.config,
        request.options,
        &store,
        &mut solver,
        progress_cb,
    )
}

/// Process `units` in order against `store`, invoking `invoker` for every unit
/// the cache cannot satisfy.
///
/// A failing unit is logged and left out of the result; the run only fails
/// when no unit at all yields a table.
pub fn run_units(
    units: &[WorkUnit],
    config: &StudyConfig,
    options: StudyOptions,
    store: &ResultStore,
    invoker: &mut dyn SolverInvoker,
    progress_cb: Option<&mut dyn FnMut(StudyProgressEvent)>,
) -> AppResult<StudyResponse> {
    let mut runner = UnitRunner {
        config,
        options,
        store,
        invoker,
        progress_cb,
        started: Instant::now(),
        total: units.len(),
        timing: StudyTimingSummary::default(),
    };

    let purge = options.force.then(|| runner.purge());

    let mut result = StudyResult::new(&config.cycles);
    let mut reports = Vec::with_capacity(units.len());

    for (index, unit) in units.iter().enumerate() {
        tracing::info!(
            mesh = %unit.mesh.file_name,
            cycle = %unit.cycle,
            refinements = unit.target_refinement(),
            "processing unit"
        );

        let (outcome, table) = runner.process(index, unit);
        if let Some(table) = table {
            result.insert(unit.cycle, unit.mesh.name.clone(), table);
        }

        reports.push(UnitReport {
            unit: unit.key(),
            mesh: unit.mesh.name.clone(),
            cycle: unit.cycle,
            target_refinement: unit.target_refinement(),
            outcome,
        });
    }

    let mut timing = runner.timing.clone();
    timing.total_time_s = runner.started.elapsed().as_secs_f64();

    if result.is_empty() {
        tracing::warn!(units = units.len(), "no results to report");
        return Err(AppError::EmptyStudyResult {
            units: units.len(),
            skipped: timing.skipped + timing.failed,
        });
    }

    runner.emit(
        StudyStage::Completed,
        None,
        0,
        Some(format!(
            "{} tables ({} cached, {} computed, {} skipped, {} failed)",
            result.len(),
            timing.cache_hits,
            timing.computed,
            timing.skipped,
            timing.failed
        )),
    );

    Ok(StudyResponse {
        result,
        units: reports,
        purge,
        timing,
    })
}

/// Per-run state shared by every unit's processing step.
struct UnitRunner<'a, 'cb> {
    config: &'a StudyConfig,
    options: StudyOptions,
    store: &'a ResultStore,
    invoker: &'a mut dyn SolverInvoker,
    progress_cb: Option<&'cb mut dyn FnMut(StudyProgressEvent)>,
    started: Instant,
    total: usize,
    timing: StudyTimingSummary,
}

impl UnitRunner<'_, '_> {
    fn emit(&mut self, stage: StudyStage, unit: Option<UnitKey>, index: usize, message: Option<String>) {
        if let Some(cb) = self.progress_cb.as_deref_mut() {
            cb(StudyProgressEvent {
                stage,
                unit,
                index,
                total: self.total,
                elapsed_wall_s: self.started.elapsed().as_secs_f64(),
                message,
            });
        }
    }

    fn purge(&mut self) -> PurgeReport {
        self.emit(
            StudyStage::PurgingCache,
            None,
            0,
            Some(format!("Purging {}", self.store.root_dir().display())),
        );

        let purge_started = Instant::now();
        let report = self.store.purge_all();
        self.timing.purge_time_s = purge_started.elapsed().as_secs_f64();

        tracing::info!(
            removed = report.removed.len(),
            failed = report.failed.len(),
            "purged result cache"
        );
        report
    }

    /// Drive one unit through cache check, plot-only gate, and invocation.
    fn process(&mut self, index: usize, unit: &WorkUnit) -> (UnitOutcome, Option<ResultTable>) {
        let key = unit.key();
        let target = unit.target_refinement();
        let fingerprint = ms_results::compute_fingerprint(unit, &self.config.solver);

        if !self.options.force
            && let Some(table) = self.cached_table(index, &key, target, &fingerprint)
        {
            let max_refinement = table.max_refinement().unwrap_or(0);
            self.timing.cache_hits += 1;
            tracing::info!(unit = %key, max_refinement, "using cached result");
            self.emit(
                StudyStage::LoadedFromCache,
                Some(key),
                index,
                Some(format!("refs={}", max_refinement)),
            );
            return (UnitOutcome::CacheHit { max_refinement }, Some(table));
        }

        if self.options.plot_only {
            self.timing.skipped += 1;
            tracing::info!(unit = %key, "no sufficient cached result, skipping (plot only)");
            self.emit(
                StudyStage::UnitSkipped,
                Some(key),
                index,
                Some("no sufficient cached result".to_string()),
            );
            return (UnitOutcome::Skipped(SkipReason::PlotOnly), None);
        }

        self.emit(
            StudyStage::RunningSolver,
            Some(key.clone()),
            index,
            Some(format!("{}-cycle, refs={}", unit.cycle, target)),
        );
        let solve_started = Instant::now();
        let invoked = self.invoker.invoke(unit, target);
        self.timing.solve_time_s += solve_started.elapsed().as_secs_f64();

        match invoked {
            Ok(table) => {
                let max_refinement = table.max_refinement().unwrap_or(0);
                let saved = self.save(index, unit, &table, fingerprint);
                self.timing.computed += 1;
                (
                    UnitOutcome::Computed {
                        max_refinement,
                        saved,
                    },
                    Some(table),
                )
            }
            Err(failure) => {
                self.timing.failed += 1;
                tracing::warn!(unit = %key, error = %failure, "unit failed, continuing");
                self.emit(
                    StudyStage::UnitFailed,
                    Some(key),
                    index,
                    Some(failure.to_string()),
                );
                (UnitOutcome::Skipped(SkipReason::Failed(failure)), None)
            }
        }
    }

    /// Cached table for `key` if it reaches `target` (and, when required,
    /// was produced by the same solver configuration).
    fn cached_table(
        &mut self,
        index: usize,
        key: &UnitKey,
        target: u32,
        fingerprint: &str,
    ) -> Option<ResultTable> {
        self.emit(StudyStage::CheckingCache, Some(key.clone()), index, None);

        let cache_started = Instant::now();
        let table = self.store.load(key);
        self.timing.cache_time_s += cache_started.elapsed().as_secs_f64();
        let table = table?;

        if !is_sufficient(&table, target) {
            tracing::info!(
                unit = %key,
                cached_refinement = table.max_refinement().unwrap_or(0),
                target_refinement = target,
                "cached result is insufficient"
            );
            return None;
        }

        if self.config.cache.require_matching_fingerprint {
            let recorded = self.store.load_manifest(key).and_then(|m| m.fingerprint);
            if recorded.as_deref() != Some(fingerprint) {
                tracing::info!(unit = %key, "cached result was produced with different solver settings");
                return None;
            }
        }

        Some(table)
    }

    /// Persist a fresh table. A failed save only costs the cache entry.
    fn save(&mut self, index: usize, unit: &WorkUnit, table: &ResultTable, fingerprint: String) -> bool {
        let key = unit.key();
        self.emit(StudyStage::SavingResults, Some(key.clone()), index, None);

        let manifest = CacheManifest::new(unit, table, Some(fingerprint), &self.invoker.describe());
        let save_started = Instant::now();
        let saved = self.store.save(&manifest, table);
        self.timing.save_time_s += save_started.elapsed().as_secs_f64();

        match saved {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(unit = %key, error = %err, "failed to cache result");
                false
            }
        }
    }
}
