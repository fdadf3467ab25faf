// ============================================================
// Layer 6 — Experiment Tracker (JSON lines)
// ============================================================
// Appends one JSON object per finished epoch to
// `<model_dir>/metrics.jsonl`:
//
//   {"epoch":0.0,"fold2-train_acc":0.61,"fold2-train_auc":0.64,...}
//   {"epoch":1.0,"fold2-train_acc":0.66,"fold2-train_auc":0.70,...}
//
// Keys come from EpochMetrics::to_record, so the fold prefix
// is already applied. A BTreeMap keeps the keys sorted, which
// makes the file diff-friendly across runs.
//
// The file is opened in append mode per record, so several
// folds of one cross-validation run share one log.

use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::domain::traits::ExperimentTracker;

const METRICS_FILE: &str = "metrics.jsonl";

pub struct JsonlTracker {
    path: PathBuf,
    records: usize,
}

impl JsonlTracker {
    /// Creates the directory if needed; existing logs are kept.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics dir '{}'", dir.display()))?;

        Ok(Self { path: dir.join(METRICS_FILE), records: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written by this tracker instance.
    pub fn records(&self) -> usize {
        self.records
    }
}

impl ExperimentTracker for JsonlTracker {
    fn log(&mut self, record: &BTreeMap<String, f64>) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Cannot open metrics log '{}'", self.path.display()))?;

        let line = serde_json::to_string(record)?;
        writeln!(f, "{line}")
            .with_context(|| format!("Cannot append to metrics log '{}'", self.path.display()))?;

        self.records += 1;
        tracing::debug!("Logged {} metric values to '{}'", record.len(), self.path.display());
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::EpochMetrics;

    fn metrics(epoch: usize) -> EpochMetrics {
        EpochMetrics {
            epoch,
            train_loss: 0.6,
            train_auc: 0.7,
            train_acc: 0.65,
            valid_auc: 0.68,
            valid_acc: 0.64,
        }
    }

    #[test]
    fn test_appends_one_line_per_epoch() {
        let tmp = tempfile::tempdir().unwrap();
        let mut tracker = JsonlTracker::new(tmp.path()).unwrap();

        tracker.log_epoch(&metrics(0), None).unwrap();
        tracker.log_epoch(&metrics(1), None).unwrap();

        let content = fs::read_to_string(tracker.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(tracker.records(), 2);

        let second: BTreeMap<String, f64> = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["epoch"], 1.0);
        assert_eq!(second["valid_auc"], 0.68);
    }

    #[test]
    fn test_fold_prefix_reaches_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let mut tracker = JsonlTracker::new(tmp.path()).unwrap();

        tracker.log_epoch(&metrics(0), Some(3)).unwrap();

        let content = fs::read_to_string(tracker.path()).unwrap();
        let record: BTreeMap<String, f64> = serde_json::from_str(content.trim()).unwrap();
        assert!(record.contains_key("fold3-train_loss"));
        assert!(record.contains_key("epoch"));
    }
}
