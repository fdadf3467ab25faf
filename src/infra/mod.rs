// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of a run:
//
//   checkpoint.rs  — model.pt, best_dict.json and
//                    train_config.json in the model dir.
//                    Uses Burn's NamedMpkBytesRecorder for
//                    the weights.
//
//   metrics.rs     — JsonlTracker, the file-backed
//                    ExperimentTracker (metrics.jsonl).
//
//   predictions.rs — Inference CSV naming and writing.
//
// Other layers reach the disk only through these types, so a
// different storage backend means touching this layer alone.

/// Checkpoint, best-score and config persistence
pub mod checkpoint;

/// Per-epoch metrics log
pub mod metrics;

/// Inference output CSV
pub mod predictions;
