// ============================================================
// Layer 3 — InteractionSequence Domain Type
// ============================================================
// One student's answer history, column by column.
//
//   categorical[i][t] — value of categorical feature i at step t
//                       (question id, test id, tag, ...)
//   continuous[j][t]  — value of continuous feature j at step t
//                       (elapsed time, ...)
//   correct[t]        — 1.0 if the answer at step t was correct,
//                       0.0 if not
//
// Every column of a sequence has the same length. The model
// predicts the correctness of the LAST step from everything
// before it, so test sequences carry a placeholder there
// (`UNKNOWN_ANSWER`). No other step may hold anything but 0/1.

use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};

/// Correctness placeholder for the step being predicted.
pub const UNKNOWN_ANSWER: f32 = -1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionSequence {
    #[serde(default)]
    pub categorical: Vec<Vec<u32>>,
    #[serde(default)]
    pub continuous: Vec<Vec<f32>>,
    pub correct: Vec<f32>,
}

impl InteractionSequence {
    /// Number of interactions in this sequence
    pub fn len(&self) -> usize {
        self.correct.len()
    }

    pub fn is_empty(&self) -> bool {
        self.correct.is_empty()
    }

    /// Check that every column has the same, non-zero length and
    /// that every answer is 0 or 1 (the last may be unknown).
    pub fn validate(&self) -> Result<()> {
        let len = self.len();
        ensure!(len > 0, "sequence has no interactions");

        for (t, &c) in self.correct.iter().enumerate() {
            let is_answer = c == 0.0 || c == 1.0;
            let is_placeholder = t + 1 == len && c == UNKNOWN_ANSWER;
            ensure!(
                is_answer || is_placeholder,
                "correct[{t}] is {c}, expected 0 or 1"
            );
        }

        for (i, col) in self.categorical.iter().enumerate() {
            ensure!(
                col.len() == len,
                "categorical column {i} has {} steps, expected {len}",
                col.len()
            );
        }
        for (j, col) in self.continuous.iter().enumerate() {
            ensure!(
                col.len() == len,
                "continuous column {j} has {} steps, expected {len}",
                col.len()
            );
        }
        Ok(())
    }
}

// ─── DatasetMeta ──────────────────────────────────────────────────────────────
/// Shape of the feature space, derived from the data.
///
/// `cate_sizes[i]` is the number of distinct values categorical
/// column i can take (`max value + 1`). The embedding for that
/// column reserves one more slot for the padding sentinel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub cate_sizes: Vec<usize>,
    pub n_conts: usize,
}

impl DatasetMeta {
    /// Scan a set of sequences. All sequences must agree on
    /// how many categorical and continuous columns they carry.
    pub fn from_sequences(sequences: &[InteractionSequence]) -> Result<Self> {
        let Some(first) = sequences.first() else {
            bail!("cannot derive feature layout from an empty dataset");
        };

        let mut meta = Self {
            cate_sizes: vec![0; first.categorical.len()],
            n_conts: first.continuous.len(),
        };
        for seq in sequences {
            meta.absorb(seq)?;
        }
        Ok(meta)
    }

    /// Widen this layout to also cover `other` (e.g. the test set).
    pub fn merge(&mut self, other: &DatasetMeta) -> Result<()> {
        ensure!(
            self.cate_sizes.len() == other.cate_sizes.len() && self.n_conts == other.n_conts,
            "feature layout mismatch: {} categorical / {} continuous vs {} / {}",
            self.cate_sizes.len(),
            self.n_conts,
            other.cate_sizes.len(),
            other.n_conts
        );
        for (mine, theirs) in self.cate_sizes.iter_mut().zip(&other.cate_sizes) {
            *mine = (*mine).max(*theirs);
        }
        Ok(())
    }

    /// Number of categorical model inputs, the interaction included.
    pub fn n_cates(&self) -> usize {
        self.cate_sizes.len() + 1
    }

    /// Fail if a sequence uses a column layout or a category
    /// value the model was not built for.
    pub fn check(&self, seq: &InteractionSequence) -> Result<()> {
        seq.validate()?;
        ensure!(
            seq.categorical.len() == self.cate_sizes.len(),
            "expected {} categorical columns, found {}",
            self.cate_sizes.len(),
            seq.categorical.len()
        );
        ensure!(
            seq.continuous.len() == self.n_conts,
            "expected {} continuous columns, found {}",
            self.n_conts,
            seq.continuous.len()
        );
        for (i, (col, &size)) in seq.categorical.iter().zip(&self.cate_sizes).enumerate() {
            if let Some(&v) = col.iter().find(|&&v| v as usize >= size) {
                bail!("categorical column {i} value {v} is outside the vocabulary (size {size})");
            }
        }
        Ok(())
    }

    fn absorb(&mut self, seq: &InteractionSequence) -> Result<()> {
        seq.validate()?;
        ensure!(
            seq.categorical.len() == self.cate_sizes.len() && seq.continuous.len() == self.n_conts,
            "inconsistent column layout: {} categorical / {} continuous, expected {} / {}",
            seq.categorical.len(),
            seq.continuous.len(),
            self.cate_sizes.len(),
            self.n_conts
        );
        for (size, col) in self.cate_sizes.iter_mut().zip(&seq.categorical) {
            if let Some(&max) = col.iter().max() {
                *size = (*size).max(max as usize + 1);
            }
        }
        Ok(())
    }
}
