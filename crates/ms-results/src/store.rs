//! Result cache: one table (plus manifest) per work unit.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ms_core::UnitKey;

use crate::table::ResultTable;
use crate::types::{CacheEntrySummary, CacheManifest, PurgeReport};
use crate::{ResultsError, ResultsResult};

const TABLE_EXTENSION: &str = "csv";
const MANIFEST_SUFFIX: &str = ".manifest.json";
const TEMP_PREFIX: &str = ".ms-tmp-";

/// A cached table can stand in for a run at `required` refinements only if it
/// already reaches that depth. Deeper tables always satisfy shallower targets.
pub fn is_sufficient(table: &ResultTable, required_refinement: u32) -> bool {
    table
        .max_refinement()
        .is_some_and(|max| max >= required_refinement)
}

#[derive(Clone, Debug)]
pub struct ResultStore {
    root_dir: PathBuf,
}

impl ResultStore {
    /// The directory is created on the first `save`, not here.
    pub fn new(root_dir: PathBuf) -> Self {
        Self { root_dir }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn table_path(&self, key: &UnitKey) -> PathBuf {
        self.root_dir
            .join(format!("{}.{}", key.as_str(), TABLE_EXTENSION))
    }

    pub fn manifest_path(&self, key: &UnitKey) -> PathBuf {
        self.root_dir
            .join(format!("{}{}", key.as_str(), MANIFEST_SUFFIX))
    }

    pub fn has_entry(&self, key: &UnitKey) -> bool {
        self.table_path(key).exists()
    }

    /// Cached table for `key`. Missing and unreadable entries both come back
    /// as `None`; the latter is logged and otherwise treated as a miss.
    pub fn load(&self, key: &UnitKey) -> Option<ResultTable> {
        match self.try_load(key) {
            Ok(table) => Some(table),
            Err(ResultsError::EntryNotFound { .. }) => None,
            Err(err) => {
                tracing::warn!(unit = %key, error = %err, "ignoring unreadable cache entry");
                None
            }
        }
    }

    pub fn try_load(&self, key: &UnitKey) -> ResultsResult<ResultTable> {
        let path = self.table_path(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ResultsError::EntryNotFound {
                    key: key.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        };
        ResultTable::parse_csv(&content)
    }

    pub fn load_manifest(&self, key: &UnitKey) -> Option<CacheManifest> {
        let content = fs::read_to_string(self.manifest_path(key)).ok()?;
        match serde_json::from_str(&content) {
            Ok(manifest) => Some(manifest),
            Err(err) => {
                tracing::warn!(unit = %key, error = %err, "ignoring unreadable cache manifest");
                None
            }
        }
    }

    /// Persist `table` under the manifest's unit key, replacing any previous entry.
    ///
    /// Both files are written to a temporary name and renamed into place. The
    /// old manifest is dropped first, so an interrupted save never leaves a new
    /// table paired with stale metadata.
    pub fn save(&self, manifest: &CacheManifest, table: &ResultTable) -> ResultsResult<()> {
        fs::create_dir_all(&self.root_dir)?;
        let key = manifest.key();

        remove_if_exists(&self.manifest_path(&key))?;
        self.write_atomic(&self.table_path(&key), table.to_csv().as_bytes())?;

        let manifest_json = serde_json::to_string_pretty(manifest)?;
        self.write_atomic(&self.manifest_path(&key), manifest_json.as_bytes())?;

        Ok(())
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> ResultsResult<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.root_dir)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    pub fn remove(&self, key: &UnitKey) -> ResultsResult<()> {
        remove_if_exists(&self.manifest_path(key))?;
        remove_if_exists(&self.table_path(key))?;
        Ok(())
    }

    /// Delete every cache file in the store. Files the store did not write are
    /// left alone; a failed deletion is logged and recorded, never fatal.
    pub fn purge_all(&self) -> PurgeReport {
        let mut report = PurgeReport::default();

        let entries = match fs::read_dir(&self.root_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return report,
            Err(err) => {
                tracing::warn!(dir = %self.root_dir.display(), error = %err, "cannot list cache directory");
                report.failed.push((self.root_dir.clone(), err.to_string()));
                return report;
            }
        };

        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(err) => {
                    tracing::warn!(error = %err, "cannot read cache directory entry");
                    report.failed.push((self.root_dir.clone(), err.to_string()));
                    continue;
                }
            };
            if !path.is_file() || !is_cache_file(&path) {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => report.removed.push(path),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "failed to delete cache file");
                    report.failed.push((path, err.to_string()));
                }
            }
        }

        report
    }

    pub fn list_entries(&self) -> ResultsResult<Vec<CacheEntrySummary>> {
        let mut entries = Vec::new();

        if !self.root_dir.exists() {
            return Ok(entries);
        }

        for entry in fs::read_dir(&self.root_dir)? {
            let path = entry?.path();
            let is_table = path.extension().is_some_and(|ext| ext == TABLE_EXTENSION)
                && !file_name_of(&path).starts_with(TEMP_PREFIX);
            if !is_table {
                continue;
            }

            let unit_key = match path.file_stem() {
                Some(stem) => stem.to_string_lossy().into_owned(),
                None => continue,
            };
            let table = fs::read_to_string(&path)
                .ok()
                .and_then(|content| ResultTable::parse_csv(&content).ok());
            let manifest = fs::read_to_string(self.root_dir.join(format!("{}{}", unit_key, MANIFEST_SUFFIX)))
                .ok()
                .and_then(|content| serde_json::from_str(&content).ok());

            entries.push(CacheEntrySummary {
                unit_key,
                table_path: path,
                rows: table.as_ref().map(ResultTable::len),
                max_refinement: table.as_ref().and_then(ResultTable::max_refinement),
                manifest,
            });
        }

        entries.sort_by(|a, b| a.unit_key.cmp(&b.unit_key));
        Ok(entries)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn is_cache_file(path: &Path) -> bool {
    let name = file_name_of(path);
    name.starts_with(TEMP_PREFIX)
        || name.ends_with(MANIFEST_SUFFIX)
        || path.extension().is_some_and(|ext| ext == TABLE_EXTENSION)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}
