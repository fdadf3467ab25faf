// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The run controller only talks to an ExperimentTracker; it
// never knows whether metrics end up in a file, a dashboard
// or nowhere at all. The handle is passed in explicitly, so
// there is no process-wide tracking session.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::domain::metrics::EpochMetrics;
use crate::domain::sequence::InteractionSequence;

// ─── SequenceSource ───────────────────────────────────────────────────────────
/// Any component that can produce student interaction sequences.
///
/// Implementations:
///   - JsonlSequenceLoader → one JSON object per line on disk
pub trait SequenceSource {
    fn load_all(&self) -> Result<Vec<InteractionSequence>>;
}

// ─── ExperimentTracker ────────────────────────────────────────────────────────
/// Receives one key/value record per finished epoch.
///
/// Implementations:
///   - JsonlTracker → appends to metrics.jsonl in the model dir
///   - NoopTracker  → discards everything
pub trait ExperimentTracker {
    fn log(&mut self, record: &BTreeMap<String, f64>) -> Result<()>;

    /// Convenience wrapper: flatten the epoch metrics with the
    /// optional fold prefix and forward them to `log`.
    fn log_epoch(&mut self, metrics: &EpochMetrics, fold: Option<usize>) -> Result<()> {
        self.log(&metrics.to_record(fold))
    }
}

/// Tracker used when tracking is switched off.
#[derive(Debug, Default)]
pub struct NoopTracker;

impl ExperimentTracker for NoopTracker {
    fn log(&mut self, _record: &BTreeMap<String, f64>) -> Result<()> {
        Ok(())
    }
}
