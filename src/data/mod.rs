// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a JSON-lines file on disk to a RawBatch of
// tensors:
//
//   sequences.jsonl
//       │
//       ▼
//   JsonlSequenceLoader → Vec<InteractionSequence>
//       │
//       ▼
//   splitter            → train / validation (ratio or k-fold)
//       │
//       ▼
//   SequenceDataset     → implements Burn's Dataset trait
//       │
//       ▼
//   SequenceBatcher     → pads / truncates, stacks into RawBatch
//       │
//       ▼
//   DataLoader          → feeds batches to the epoch loop

/// Reads interaction sequences from JSON lines
pub mod loader;

/// Implements Burn's Dataset trait for interaction sequences
pub mod dataset;

/// Implements Burn's Batcher trait to create raw tensor batches
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;
