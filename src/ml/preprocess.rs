// ============================================================
// Layer 5 — Batch Preprocessor
// ============================================================
// Turns a RawBatch (all float, straight from the batcher) into
// the tensors the models consume:
//
//   categorical — Int, value + 1 so 0 stays the padding id,
//                 zeroed where mask = 0, plus the interaction
//   continuous  — Float, zeroed where mask = 0
//   mask        — Float
//   correct     — Float, the prediction target
//
// The interaction feature is the previous step's answer:
//
//   correct      [1 0 0 1]
//   correct + 1  [2 1 1 2]
//   shift right  [0 2 1 1]   <- position 0 has no previous step
//
// The shift inserts a zero column in front instead of rolling,
// so the last step can never wrap around into position 0.

use anyhow::{ensure, Context, Result};
use burn::prelude::*;

use crate::data::batcher::RawBatch;

/// Model-ready batch. `categorical` ends with the interaction.
#[derive(Debug, Clone)]
pub struct ModelInput<B: Backend> {
    pub categorical: Vec<Tensor<B, 2, Int>>,
    pub continuous: Vec<Tensor<B, 2>>,
    pub mask: Tensor<B, 2>,
    pub correct: Tensor<B, 2>,
}

impl<B: Backend> ModelInput<B> {
    pub fn dims(&self) -> [usize; 2] {
        self.mask.dims()
    }
}

/// Split and cast a raw batch.
///
/// `n_cates` counts the model's categorical inputs INCLUDING the
/// interaction, so the first `n_cates - 1` raw columns are the
/// categorical features.
pub fn process_batch<B: Backend>(
    batch: RawBatch<B>,
    n_cates: usize,
    device: &B::Device,
) -> Result<ModelInput<B>> {
    ensure!(n_cates >= 1, "n_cates must count at least the interaction feature");
    let n_raw_cates = n_cates - 1;

    let mut columns = batch.columns;
    ensure!(
        columns.len() >= n_raw_cates + 2,
        "batch has {} tensors, need {} categorical + correct + mask",
        columns.len(),
        n_raw_cates
    );

    // Layout is [..features, correct, mask]
    let mask = columns.pop().context("batch has no mask tensor")?;
    let correct = columns.pop().context("batch has no correctness tensor")?;

    let [_, seq_len] = mask.dims();
    ensure!(seq_len >= 1, "cannot build the interaction feature of a zero-length sequence");
    ensure!(
        correct.dims() == mask.dims(),
        "correct {:?} and mask {:?} shapes differ",
        correct.dims(),
        mask.dims()
    );

    let interaction = shift_right(correct.clone() + 1.0) * shift_right(mask.clone());

    let continuous_raw = columns.split_off(n_raw_cates);

    let mut categorical: Vec<Tensor<B, 2, Int>> = columns
        .into_iter()
        .map(|col| ((col + 1.0) * mask.clone()).int().to_device(device))
        .collect();
    categorical.push(interaction.int().to_device(device));

    let continuous = continuous_raw
        .into_iter()
        .map(|col| (col * mask.clone()).to_device(device))
        .collect();

    Ok(ModelInput {
        categorical,
        continuous,
        mask: mask.to_device(device),
        correct: correct.to_device(device),
    })
}

/// Shift every row one step to the right along the sequence
/// axis. Position 0 becomes zero and the last step is dropped.
pub fn shift_right<B: Backend>(tensor: Tensor<B, 2>) -> Tensor<B, 2> {
    let [batch_size, seq_len] = tensor.dims();
    let device = tensor.device();

    if seq_len <= 1 {
        return Tensor::zeros([batch_size, seq_len], &device);
    }

    let head = Tensor::zeros([batch_size, 1], &device);
    let body = tensor.slice([0..batch_size, 0..seq_len - 1]);
    Tensor::cat(vec![head, body], 1)
}
