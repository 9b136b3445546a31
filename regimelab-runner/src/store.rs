//! Persistence — universe snapshots and diagnostic history.
//!
//! Snapshots are one JSON file per date (`universe_YYYY-MM-DD.json`) so
//! FOCUS tracking resumes across restarts. Diagnostics append to a JSONL
//! file, one `DiagnosticOutput` per line — each line is an independent JSON
//! object, resilient to partial writes and easy to stream.

use chrono::NaiveDate;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use regimelab_core::{DiagnosticOutput, UniverseSnapshot};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error for {path}: {reason}")]
    Serde { path: PathBuf, reason: String },

    #[error("no snapshot found for {0}")]
    NotFound(NaiveDate),
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Directory of per-date universe snapshot files.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("universe_{date}.json"))
    }

    /// Persist a snapshot under its own date.
    pub fn save(&self, snapshot: &UniverseSnapshot) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        let path = self.path_for(snapshot.date);
        let json = serde_json::to_string_pretty(snapshot).map_err(|e| StoreError::Serde {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&path, json).map_err(|e| io_err(&path, e))?;
        Ok(path)
    }

    /// Load the snapshot for an exact date.
    pub fn load(&self, date: NaiveDate) -> Result<UniverseSnapshot, StoreError> {
        let path = self.path_for(date);
        if !path.exists() {
            return Err(StoreError::NotFound(date));
        }
        let content = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        serde_json::from_str(&content).map_err(|e| StoreError::Serde {
            path,
            reason: e.to_string(),
        })
    }

    /// The most recent snapshot strictly before `date`, if any.
    ///
    /// This is how a daily run resumes FOCUS tracking: yesterday's snapshot
    /// (or the last one before a gap) seeds today's cycle.
    pub fn latest_before(&self, date: NaiveDate) -> Result<Option<UniverseSnapshot>, StoreError> {
        if !self.dir.is_dir() {
            return Ok(None);
        }
        let mut best: Option<NaiveDate> = None;
        for entry in fs::read_dir(&self.dir).map_err(|e| io_err(&self.dir, e))? {
            let entry = entry.map_err(|e| io_err(&self.dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stamp) = name
                .strip_prefix("universe_")
                .and_then(|s| s.strip_suffix(".json"))
            else {
                continue;
            };
            let Ok(stamp) = NaiveDate::parse_from_str(stamp, "%Y-%m-%d") else {
                continue;
            };
            if stamp < date && best.map_or(true, |b| stamp > b) {
                best = Some(stamp);
            }
        }
        match best {
            Some(stamp) => self.load(stamp).map(Some),
            None => Ok(None),
        }
    }
}

/// Append-only JSONL file of diagnostic outputs.
pub struct DiagnosticHistory {
    path: PathBuf,
}

impl DiagnosticHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one diagnostic as a single JSON line.
    pub fn append(&self, output: &DiagnosticOutput) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let json = serde_json::to_string(output).map_err(|e| StoreError::Serde {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_err(&self.path, e))?;
        writeln!(file, "{json}").map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }

    /// Read every stored diagnostic. Malformed lines are skipped.
    pub fn read_all(&self) -> Result<Vec<DiagnosticOutput>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path).map_err(|e| io_err(&self.path, e))?;
        let mut out = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| io_err(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(parsed) = serde_json::from_str::<DiagnosticOutput>(&line) {
                out.push(parsed);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regimelab_core::{
        BaselineState, Classifier, Explainer, UniverseSnapshot,
    };
    use std::collections::BTreeMap;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn sample_diagnostic(ticker: &str, date: NaiveDate) -> DiagnosticOutput {
        let regime = Classifier::new().classify(
            &BTreeMap::new(),
            &BTreeMap::new(),
            &BTreeMap::new(),
            f64::NAN,
            false,
        );
        Explainer::new().explain(ticker, date, regime, None, Vec::new(), BaselineState::Empty)
    }

    #[test]
    fn snapshot_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let snapshot = UniverseSnapshot::bootstrap(d(5));
        store.save(&snapshot).unwrap();
        let loaded = store.load(d(5)).unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn load_missing_date_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(matches!(store.load(d(1)), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn latest_before_skips_future_and_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        for day in [1, 4, 8] {
            store.save(&UniverseSnapshot::bootstrap(d(day))).unwrap();
        }
        let found = store.latest_before(d(7)).unwrap().unwrap();
        assert_eq!(found.date, d(4));
        assert!(store.latest_before(d(1)).unwrap().is_none());
    }

    #[test]
    fn history_appends_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let history = DiagnosticHistory::new(dir.path().join("diagnostics.jsonl"));
        history.append(&sample_diagnostic("SPY", d(5))).unwrap();
        history.append(&sample_diagnostic("QQQ", d(5))).unwrap();
        let all = history.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].ticker, "SPY");
        assert_eq!(all[1].ticker, "QQQ");
    }

    #[test]
    fn empty_history_reads_empty() {
        let history = DiagnosticHistory::new("/nonexistent/diagnostics.jsonl");
        assert!(history.read_all().unwrap().is_empty());
    }
}
