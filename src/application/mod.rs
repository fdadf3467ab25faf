// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training or predicting a test set).
//
// Rules for this layer:
//   - No tensor math or model code here
//   - No argument parsing here (that's Layer 1)
//   - Files are reached through Layer 4 and Layer 6 types
//   - Only workflow coordination and run-time dispatch

use std::fmt;

use serde::{Deserialize, Serialize};

// The training workflow
pub mod train_use_case;

// The prediction workflow
pub mod inference_use_case;

/// Where tensors live. Training wraps either in `Autodiff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    /// NdArray backend
    Cpu,
    /// WGPU backend
    Gpu,
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
        })
    }
}

/// Which ExperimentTracker a training run reports to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerKind {
    /// metrics.jsonl in the model dir
    Jsonl,
    None,
}
