// ============================================================
// Layer 3 — Epoch Metrics and Training State
// ============================================================
// Plain data describing how a run is going. No tensors here:
// the ml layer fills these in, the infra layer persists them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One epoch's numbers, as sent to the experiment tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Zero-based epoch index
    pub epoch: usize,
    pub train_loss: f64,
    pub train_auc: f64,
    pub train_acc: f64,
    pub valid_auc: f64,
    pub valid_acc: f64,
}

impl EpochMetrics {
    /// Flatten into tracker keys. With a fold every metric key
    /// (but not `epoch`) is prefixed with `fold{N}-`.
    pub fn to_record(&self, fold: Option<usize>) -> BTreeMap<String, f64> {
        let prefix = fold_prefix(fold);
        let mut record = BTreeMap::new();
        record.insert("epoch".to_string(), self.epoch as f64);
        record.insert(format!("{prefix}train_loss"), self.train_loss);
        record.insert(format!("{prefix}train_auc"), self.train_auc);
        record.insert(format!("{prefix}train_acc"), self.train_acc);
        record.insert(format!("{prefix}valid_auc"), self.valid_auc);
        record.insert(format!("{prefix}valid_acc"), self.valid_acc);
        record
    }
}

pub fn fold_prefix(fold: Option<usize>) -> String {
    match fold {
        Some(n) => format!("fold{n}-"),
        None => String::new(),
    }
}

// ─── BestScore ────────────────────────────────────────────────────────────────
/// The summary written to best_dict.json when a run ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestScore {
    /// Zero-based epoch of the best validation AUC, `None`
    /// when no epoch ever beat the sentinel.
    #[serde(rename = "best_epoch(auc)")]
    pub best_epoch: Option<usize>,
    pub auc: f64,
    pub acc: f64,
}

// ─── TrainingState ────────────────────────────────────────────────────────────
/// What the run controller decided after validating an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochDecision {
    /// New best AUC: checkpoint and keep going
    Improved,
    /// No improvement, patience not yet exhausted
    Stalled,
    /// No improvement and patience exhausted: stop now
    EarlyStop,
}

/// Best-score bookkeeping and the early stopping counter.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingState {
    best_auc: f64,
    best_acc: f64,
    best_epoch: Option<usize>,
    stall_count: usize,
    patience: usize,
}

impl TrainingState {
    pub fn new(patience: usize) -> Self {
        Self {
            // Below any valid AUC, so the first real epoch always wins.
            best_auc: -1.0,
            best_acc: -1.0,
            best_epoch: None,
            stall_count: 0,
            patience,
        }
    }

    /// Record an epoch's validation result. Only a strictly
    /// greater AUC counts as an improvement.
    pub fn observe(&mut self, epoch: usize, auc: f64, acc: f64) -> EpochDecision {
        if auc > self.best_auc {
            self.best_auc = auc;
            self.best_acc = acc;
            self.best_epoch = Some(epoch);
            self.stall_count = 0;
            EpochDecision::Improved
        } else {
            self.stall_count += 1;
            if self.stall_count >= self.patience {
                EpochDecision::EarlyStop
            } else {
                EpochDecision::Stalled
            }
        }
    }

    pub fn stall_count(&self) -> usize {
        self.stall_count
    }

    pub fn patience(&self) -> usize {
        self.patience
    }

    pub fn best(&self) -> BestScore {
        BestScore {
            best_epoch: self.best_epoch,
            auc: self.best_auc,
            acc: self.best_acc,
        }
    }
}
