//! Persisted cumulative totals for counter sensors.
//!
//! Each detected reset folds the counter's last pre-reset raw reading
//! into a running total, so the published value stays monotonic across
//! meter resets. The totals survive process restarts in a small JSON
//! file (one object, field index -> total) that is fully rewritten on
//! every update and again at shutdown.
//!
//! Persistence faults are never fatal: a missing or corrupt file starts
//! the totals from zero, an unwritable file keeps the in-memory state
//! running.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Running totals per counter field index.
#[derive(Debug, Default)]
pub struct CumulativeTotals {
    totals: BTreeMap<usize, f64>,
    path: PathBuf,
}

impl CumulativeTotals {
    /// Create an empty store that persists to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            totals: BTreeMap::new(),
            path: path.into(),
        }
    }

    /// Load persisted totals from `path`. A missing or corrupt file is
    /// logged and treated as empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let totals = match Self::read_file(&path) {
            Ok(totals) => {
                info!("loaded cumulative totals from {}", path.display());
                totals
            }
            Err(e) => {
                warn!(
                    "could not load cumulative totals from {} ({e}), starting from zero",
                    path.display()
                );
                BTreeMap::new()
            }
        };
        Self { totals, path }
    }

    fn read_file(path: &Path) -> Result<BTreeMap<usize, f64>, Box<dyn std::error::Error>> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Accumulated total for one counter, zero if none recorded yet.
    pub fn get(&self, field_index: usize) -> f64 {
        self.totals.get(&field_index).copied().unwrap_or(0.0)
    }

    /// Fold a reset carry-over into the total and persist immediately.
    /// Totals only ever increase.
    pub fn accumulate(&mut self, field_index: usize, carry: f64) {
        if carry <= 0.0 {
            return;
        }
        let total = self.totals.entry(field_index).or_insert(0.0);
        *total += carry;
        info!(
            "added {carry} to cumulative total of sensor {field_index}, new total {}",
            *total
        );
        self.persist();
    }

    /// Rewrite the totals file. Failures are logged, not propagated.
    pub fn persist(&self) {
        if let Err(e) = self.write_file() {
            warn!(
                "could not persist cumulative totals to {}: {e}",
                self.path.display()
            );
        }
    }

    fn write_file(&self) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(&self.totals)?;
        std::fs::write(&self.path, json)
    }

    #[cfg(test)]
    pub(crate) fn set_for_test(&mut self, field_index: usize, total: f64) {
        self.totals.insert(field_index, total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let totals = CumulativeTotals::load(dir.path().join("nope.json"));
        assert_eq!(totals.get(2), 0.0);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("totals.json");
        std::fs::write(&path, "{not json").unwrap();
        let totals = CumulativeTotals::load(&path);
        assert_eq!(totals.get(2), 0.0);
    }

    #[test]
    fn accumulate_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("totals.json");

        let mut totals = CumulativeTotals::load(&path);
        totals.accumulate(2, 1234.5);
        totals.accumulate(2, 100.0);

        let reloaded = CumulativeTotals::load(&path);
        assert_eq!(reloaded.get(2), 1334.5);
    }

    #[test]
    fn non_positive_carry_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut totals = CumulativeTotals::load(dir.path().join("totals.json"));
        totals.accumulate(2, 0.0);
        totals.accumulate(2, -5.0);
        assert_eq!(totals.get(2), 0.0);
    }

    #[test]
    fn totals_never_decrease() {
        let dir = tempfile::tempdir().unwrap();
        let mut totals = CumulativeTotals::load(dir.path().join("totals.json"));
        totals.accumulate(2, 500.0);
        totals.accumulate(2, 250.0);
        assert_eq!(totals.get(2), 750.0);
    }
}
