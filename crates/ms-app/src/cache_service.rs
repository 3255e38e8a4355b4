//! Inspection and maintenance of the result cache outside a study run.

use ms_core::UnitKey;
use ms_project::StudyConfig;
use ms_results::{CacheEntrySummary, PurgeReport, ResultStore, compute_fingerprint};

use crate::error::AppResult;
use crate::inventory;

/// A cache entry judged against the current configuration.
#[derive(Debug, Clone)]
pub struct CacheStatus {
    pub entry: CacheEntrySummary,
    /// Configured target for the entry's unit; `None` if the unit is no longer part of the study.
    pub target_refinement: Option<u32>,
    pub sufficient: bool,
    /// `None` when no fingerprint could be compared.
    pub fingerprint_matches: Option<bool>,
}

pub fn open_store(config: &StudyConfig) -> ResultStore {
    ResultStore::new(config.output_dir.clone())
}

/// List cache entries and whether the current study would reuse them.
pub fn cache_status(config: &StudyConfig) -> AppResult<Vec<CacheStatus>> {
    let store = open_store(config);
    let units = inventory::plan_units(config)?;

    let statuses = store
        .list_entries()?
        .into_iter()
        .map(|entry| {
            let unit = units.iter().find(|u| u.key().as_str() == entry.unit_key);
            let target_refinement = unit.map(|u| u.target_refinement());
            let sufficient = match (entry.max_refinement, target_refinement) {
                (Some(max), Some(target)) => max >= target,
                _ => false,
            };
            let fingerprint_matches = unit.and_then(|u| {
                let recorded = entry.manifest.as_ref()?.fingerprint.as_deref()?;
                Some(recorded == compute_fingerprint(u, &config.solver))
            });

            CacheStatus {
                entry,
                target_refinement,
                sufficient,
                fingerprint_matches,
            }
        })
        .collect();

    Ok(statuses)
}

pub fn purge_cache(config: &StudyConfig) -> AppResult<PurgeReport> {
    let store = open_store(config);
    Ok(store.purge_all())
}

pub fn remove_entry(config: &StudyConfig, key: &UnitKey) -> AppResult<()> {
    let store = open_store(config);
    store.remove(key)?;
    Ok(())
}
