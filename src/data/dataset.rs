// ============================================================
// Layer 4 — Sequence Dataset
// ============================================================
// In-memory list of sequences behind Burn's Dataset trait, so
// the DataLoader can index and batch them.

use burn::data::dataset::Dataset;

use crate::domain::sequence::InteractionSequence;

pub struct SequenceDataset {
    sequences: Vec<InteractionSequence>,
}

impl SequenceDataset {
    pub fn new(sequences: Vec<InteractionSequence>) -> Self {
        Self { sequences }
    }

    pub fn sequence_count(&self) -> usize {
        self.sequences.len()
    }

    /// Total number of interactions across all students.
    pub fn interaction_count(&self) -> usize {
        self.sequences.iter().map(InteractionSequence::len).sum()
    }
}

impl Dataset<InteractionSequence> for SequenceDataset {
    fn get(&self, index: usize) -> Option<InteractionSequence> {
        self.sequences.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.sequences.len()
    }
}
