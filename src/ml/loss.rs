// ============================================================
// Layer 5 — Loss Computer
// ============================================================
// Binary cross entropy (burn's BinaryCrossEntropyLoss on
// probabilities) over the models' sigmoid outputs. Only
// the LAST timestep of each sequence contributes: earlier steps
// are context, the final step is the question being predicted.

use anyhow::{ensure, Result};
use burn::{nn::loss::BinaryCrossEntropyLossConfig, prelude::*};

/// Keeps ln() away from 0 and 1.
const EPS: f64 = 1e-7;

/// preds, targets: [batch_size, max_seq_len] → scalar mean of
/// the last-step losses.
pub fn compute_loss<B: Backend>(preds: Tensor<B, 2>, targets: Tensor<B, 2>) -> Result<Tensor<B, 1>> {
    ensure!(
        preds.dims() == targets.dims(),
        "prediction shape {:?} does not match target shape {:?}",
        preds.dims(),
        targets.dims()
    );
    let [batch_size, seq_len] = preds.dims();
    ensure!(batch_size > 0 && seq_len > 0, "cannot compute a loss over an empty batch");

    let device = preds.device();
    let last_preds = preds
        .slice([0..batch_size, seq_len - 1..seq_len])
        .clamp(EPS, 1.0 - EPS);
    let last_targets = targets.slice([0..batch_size, seq_len - 1..seq_len]);

    let bce = BinaryCrossEntropyLossConfig::new().init(&device);
    Ok(bce.forward(last_preds, last_targets.int()))
}
