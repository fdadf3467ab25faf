// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All tensor code lives here. Other layers hand over plain
// data (sequences, configs) and get back plain numbers.
//
//   preprocess.rs — raw batch → model input (shift, mask, casts)
//   loss.rs       — last-timestep binary cross-entropy
//   metric.rs     — AUC and accuracy on host vectors
//   optim.rs      — Adam / AdamW configs, the parameter updater
//   scheduler.rs  — per-epoch learning rate policies
//
//   model.rs      — shared embedding front end, SequenceModel,
//                   the name → architecture registry
//   lstm.rs       — `lstm`
//   lstm_attn.rs  — `lstmattn`
//   bert.rs       — `bert`
//
//   trainer.rs    — one train epoch / one validation pass
//   controller.rs — the multi-epoch run: checkpoints, early
//                   stopping, scheduler, tracker
//   inferencer.rs — checkpoint → predictions

pub mod preprocess;
pub mod loss;
pub mod metric;
pub mod optim;
pub mod scheduler;

pub mod model;
pub mod lstm;
pub mod lstm_attn;
pub mod bert;

pub mod trainer;
pub mod controller;
pub mod inferencer;
