// ============================================================
// Layer 5 — Epoch Loop
// ============================================================
// One pass over the training loader and one over the
// validation loader. Both collect the LAST timestep of every
// sequence (the interaction being predicted) and score them.
//
// Key Burn insight:
//   - Training runs on an AutodiffBackend; dropout is active
//     because the backend tracks gradients
//   - Validation takes model.valid(), which lives on the inner
//     backend: no graph, no dropout, no parameter updates
//   - The validation loader must batch on the inner backend too
//
//   batch ──► process_batch ──► model.forward ──► compute_loss ──► update_params
//                                     │
//                                     └──► last step ──► preds / targets ──► get_metric

use anyhow::{anyhow, ensure, Result};
use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    optim::Optimizer,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::RawBatch;
use crate::ml::loss::compute_loss;
use crate::ml::metric::get_metric;
use crate::ml::model::SequenceModel;
use crate::ml::optim::update_params;
use crate::ml::preprocess::process_batch;

/// Settings the epoch loop needs from the run configuration.
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    /// Categorical model inputs, interaction included
    pub n_cates: usize,
    /// Log the loss every this many batches (0 disables)
    pub log_steps: usize,
    /// Global gradient-norm threshold
    pub clip_grad: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainOutcome {
    pub auc: f64,
    pub acc: f64,
    pub loss: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidOutcome {
    pub auc: f64,
    pub acc: f64,
    pub preds: Vec<f32>,
    pub targets: Vec<f32>,
}

/// [batch, seq] → [batch], keeping only the final column.
pub fn last_step<B: Backend>(tensor: Tensor<B, 2>) -> Tensor<B, 1> {
    let [batch_size, seq_len] = tensor.dims();
    tensor
        .slice([0..batch_size, seq_len.saturating_sub(1)..seq_len])
        .reshape([batch_size])
}

/// Pull a tensor back to the host.
pub fn to_host<B: Backend>(tensor: Tensor<B, 1>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Failed to read tensor back to host: {e:?}"))
}

/// One training epoch. The model is threaded through by value
/// because every optimizer step returns an updated module.
pub fn train<B, M, O>(
    loader: &dyn DataLoader<RawBatch<B>>,
    mut model: M,
    optim: &mut O,
    lr: f64,
    settings: LoopSettings,
    device: &B::Device,
) -> Result<(M, TrainOutcome)>
where
    B: AutodiffBackend,
    M: SequenceModel<B> + AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    let mut preds: Vec<f32> = Vec::new();
    let mut targets: Vec<f32> = Vec::new();
    let mut loss_sum = 0.0f64;
    let mut step = 0usize;

    for batch in loader.iter() {
        let input = process_batch(batch, settings.n_cates, device)?;
        let output = model.forward(&input);

        let loss = compute_loss(output.clone(), input.correct.clone())?;
        let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

        // detached copies leave the graph before backward consumes it
        preds.extend(to_host(last_step(output.detach()))?);
        targets.extend(to_host(last_step(input.correct))?);

        model = update_params(loss, model, optim, lr, settings.clip_grad);

        if settings.log_steps > 0 && step % settings.log_steps == 0 {
            tracing::info!("Training steps: {} Loss: {:.6}", step, loss_val);
        }

        loss_sum += loss_val;
        step += 1;
    }

    ensure!(step > 0, "Training loader produced no batches");

    let (auc, acc) = get_metric(&targets, &preds)?;
    let loss = loss_sum / step as f64;
    tracing::info!("TRAIN AUC : {:.4} ACC : {:.4}", auc, acc);

    Ok((model, TrainOutcome { auc, acc, loss }))
}

/// One validation pass. Call with `model.valid()` and a loader
/// batching on the inner backend.
pub fn validate<B, M>(
    loader: &dyn DataLoader<RawBatch<B>>,
    model: &M,
    settings: LoopSettings,
    device: &B::Device,
) -> Result<ValidOutcome>
where
    B: Backend,
    M: SequenceModel<B>,
{
    let (preds, targets) = predict_last_steps(loader, model, settings.n_cates, device)?;
    ensure!(!preds.is_empty(), "Validation loader produced no batches");

    let (auc, acc) = get_metric(&targets, &preds)?;
    tracing::info!("VALID AUC : {:.4} ACC : {:.4}", auc, acc);

    Ok(ValidOutcome { auc, acc, preds, targets })
}

/// Forward every batch and collect (predictions, targets) at the
/// last timestep, in loader order. Shared with inference.
pub fn predict_last_steps<B, M>(
    loader: &dyn DataLoader<RawBatch<B>>,
    model: &M,
    n_cates: usize,
    device: &B::Device,
) -> Result<(Vec<f32>, Vec<f32>)>
where
    B: Backend,
    M: SequenceModel<B>,
{
    let mut preds: Vec<f32> = Vec::new();
    let mut targets: Vec<f32> = Vec::new();

    for batch in loader.iter() {
        let input = process_batch(batch, n_cates, device)?;
        let output = model.forward(&input);

        preds.extend(to_host(last_step(output))?);
        targets.extend(to_host(last_step(input.correct))?);
    }

    Ok((preds, targets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        data::dataloader::DataLoaderBuilder,
    };

    use crate::data::{batcher::SequenceBatcher, dataset::SequenceDataset};
    use crate::domain::sequence::InteractionSequence;
    use crate::ml::lstm::LstmModel;
    use crate::ml::model::SequenceModelConfig;
    use crate::ml::optim::adam_config;

    type TrainBackend = Autodiff<NdArray>;
    type InnerBackend = NdArray;

    fn sequences() -> Vec<InteractionSequence> {
        (0..8u32)
            .map(|i| InteractionSequence {
                categorical: vec![vec![i % 4, (i + 1) % 4, (i + 2) % 4]],
                continuous: vec![vec![0.1, 0.5, 0.9]],
                correct: vec![1.0, 0.0, (i % 2) as f32],
            })
            .collect()
    }

    fn settings() -> LoopSettings {
        LoopSettings { n_cates: 2, log_steps: 1, clip_grad: 10.0 }
    }

    fn model_config() -> SequenceModelConfig {
        SequenceModelConfig::new(vec![4], 1, 6, 1, 2, 0.0, 4)
    }

    #[test]
    fn test_last_step_takes_final_column() {
        let device = Default::default();
        let t = Tensor::<InnerBackend, 2>::from_data(
            TensorData::new(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], [2, 3]),
            &device,
        );
        assert_eq!(to_host(last_step(t)).unwrap(), vec![3.0, 6.0]);
    }

    #[test]
    fn test_train_then_validate_runs_an_epoch() {
        let device = Default::default();

        let train_loader = DataLoaderBuilder::new(SequenceBatcher::<TrainBackend>::new(device, 4))
            .batch_size(4)
            .build(SequenceDataset::new(sequences()));
        let valid_loader = DataLoaderBuilder::new(SequenceBatcher::<InnerBackend>::new(device, 4))
            .batch_size(3)
            .build(SequenceDataset::new(sequences()));

        let model: LstmModel<TrainBackend> = LstmModel::init(&model_config(), &device);
        let mut optim = adam_config(0.0).init::<TrainBackend, LstmModel<TrainBackend>>();

        let (model, outcome) =
            train(train_loader.as_ref(), model, &mut optim, 1e-3, settings(), &device).unwrap();
        assert!(outcome.loss.is_finite());
        assert!((0.0..=1.0).contains(&outcome.auc));

        let valid = validate(valid_loader.as_ref(), &model.valid(), settings(), &device).unwrap();
        assert_eq!(valid.preds.len(), 8);
        assert_eq!(valid.targets.len(), 8);
        assert!(valid.preds.iter().all(|p| *p > 0.0 && *p < 1.0));
    }

    #[test]
    fn test_empty_loader_is_an_error() {
        let device = Default::default();
        let loader = DataLoaderBuilder::new(SequenceBatcher::<InnerBackend>::new(device, 4))
            .batch_size(2)
            .build(SequenceDataset::new(Vec::new()));
        let model: LstmModel<InnerBackend> = LstmModel::init(&model_config(), &device);

        assert!(validate(loader.as_ref(), &model, settings(), &device).is_err());
    }
}
