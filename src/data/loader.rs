// ============================================================
// Layer 4 — Sequence Loader
// ============================================================
// Reads student interaction sequences from a JSON-lines file.
//
// One line = one student:
//   {"categorical": [[3, 3, 7], [12, 12, 40]],
//    "continuous":  [[0.2, 1.5, 0.7]],
//    "correct":     [1, 0, 1]}
//
// Blank lines are skipped. A malformed line aborts the load
// and the error names the file and the 1-based line number.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
};

use anyhow::{Context, Result};

use crate::domain::sequence::InteractionSequence;
use crate::domain::traits::SequenceSource;

pub struct JsonlSequenceLoader {
    path: PathBuf,
}

impl JsonlSequenceLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SequenceSource for JsonlSequenceLoader {
    fn load_all(&self) -> Result<Vec<InteractionSequence>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Cannot open sequence file '{}'", self.path.display()))?;

        let mut sequences = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| {
                format!("Failed reading '{}' at line {}", self.path.display(), idx + 1)
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let seq: InteractionSequence = serde_json::from_str(&line).with_context(|| {
                format!("Malformed sequence in '{}' at line {}", self.path.display(), idx + 1)
            })?;
            seq.validate().with_context(|| {
                format!("Invalid sequence in '{}' at line {}", self.path.display(), idx + 1)
            })?;
            sequences.push(seq);
        }

        tracing::info!(
            "Loaded {} sequences from '{}'",
            sequences.len(),
            self.path.display()
        );
        Ok(sequences)
    }
}
