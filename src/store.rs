//! Persisted JSON symbol catalog.
//!
//! Each run appends its symbols to the existing file; nothing is deduplicated.
//! Descriptors never reach disk.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::analysis::AnalysisReport;
use crate::error::{Error, Result};
use crate::models::{BoundingBox, Catalog, ClusterLabel, SymbolId};

/// One persisted symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub page: u32,
    pub symbol_id: SymbolId,
    pub path: PathBuf,
    pub position: BoundingBox,
    /// Older files may lack the key entirely
    #[serde(default)]
    pub cluster_label: Option<ClusterLabel>,
    /// Keys written by other tools, kept as they were
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedCatalog {
    pub symbols: Vec<SymbolRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Counts from one merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub previous: usize,
    pub appended: usize,
}

impl MergeSummary {
    pub fn total(&self) -> usize {
        self.previous + self.appended
    }
}

/// Records for the symbols of a run, labels taken from the analysis when present
pub fn records_for(catalog: &Catalog, report: Option<&AnalysisReport>) -> Vec<SymbolRecord> {
    catalog
        .symbols()
        .iter()
        .enumerate()
        .map(|(index, symbol)| SymbolRecord {
            page: symbol.page,
            symbol_id: symbol.symbol_id.clone(),
            path: symbol.path.clone(),
            position: symbol.position,
            cluster_label: report.and_then(|r| r.label_of(index)),
            extra: Map::new(),
        })
        .collect()
}

pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Existing catalog, or an empty one when the file does not exist.
    /// A file that exists but does not parse is an error, never replaced.
    pub fn load(&self) -> Result<PersistedCatalog> {
        if !self.path.exists() {
            return Ok(PersistedCatalog::default());
        }
        let text = std::fs::read_to_string(&self.path).map_err(|e| self.read_error(e))?;
        serde_json::from_str(&text).map_err(|e| self.read_error(e))
    }

    /// Replace the file with `catalog`. The new content is written to a
    /// temporary file next to the target and renamed over it.
    pub fn save(&self, catalog: &PersistedCatalog) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.write_error(e))?;

        let json = serde_json::to_string_pretty(catalog).map_err(|e| self.write_error(e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.write_error(e))?;
        tmp.write_all(json.as_bytes()).map_err(|e| self.write_error(e))?;
        tmp.write_all(b"\n").map_err(|e| self.write_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.write_error(e.error))?;
        Ok(())
    }

    /// Append the run's symbols (without descriptors) to the persisted catalog
    pub fn merge(&self, catalog: &Catalog, report: Option<&AnalysisReport>) -> Result<MergeSummary> {
        info!("Updating symbol catalog {}", self.path.display());
        let mut persisted = self.load()?;
        let previous = persisted.symbols.len();

        let records = records_for(catalog, report);
        let appended = records.len();
        persisted.symbols.extend(records);

        self.save(&persisted)?;
        let summary = MergeSummary { previous, appended };
        info!(
            "Catalog updated: {} symbols ({} new)",
            summary.total(),
            summary.appended
        );
        Ok(summary)
    }

    fn read_error(&self, reason: impl ToString) -> Error {
        Error::StoreRead {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    fn write_error(&self, reason: impl ToString) -> Error {
        Error::StoreWrite {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}
