// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Rebuilds the trained architecture from its config, loads
// model.pt into it and predicts the last timestep of every
// test sequence.
//
// Runs on a plain (non-autodiff) backend: no graph is built
// and dropout is inactive, which is Burn's evaluation mode.

use anyhow::Result;
use burn::{data::dataloader::DataLoader, prelude::*};

use crate::data::batcher::RawBatch;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{SequenceModel, SequenceModelConfig};
use crate::ml::trainer::predict_last_steps;

pub struct Inferencer<B: Backend, M: SequenceModel<B>> {
    model: M,
    epoch: usize,
    n_cates: usize,
    device: B::Device,
}

impl<B: Backend, M: SequenceModel<B>> Inferencer<B, M> {
    /// Fails if the checkpoint is missing or was written by a
    /// different architecture.
    pub fn from_checkpoint(
        checkpoints: &CheckpointManager,
        model_config: &SequenceModelConfig,
        device: B::Device,
    ) -> Result<Self> {
        let model = M::init(model_config, &device);
        let (model, epoch) = checkpoints.load_checkpoint::<B, M>(model, &device)?;
        tracing::info!("Model loaded from '{}'", checkpoints.model_path().display());

        Ok(Self {
            model,
            epoch,
            n_cates: model_config.cate_sizes.len() + 1,
            device,
        })
    }

    /// Epoch index stored alongside the weights.
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// One probability per test sequence, in loader order.
    pub fn predict(&self, loader: &dyn DataLoader<RawBatch<B>>) -> Result<Vec<f32>> {
        let (preds, _targets) = predict_last_steps(loader, &self.model, self.n_cates, &self.device)?;
        tracing::debug!("Predicted {} sequences", preds.len());
        Ok(preds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, data::dataloader::DataLoaderBuilder};

    use crate::data::{batcher::SequenceBatcher, dataset::SequenceDataset};
    use crate::domain::sequence::InteractionSequence;
    use crate::ml::{bert::BertModel, lstm::LstmModel};

    type TestBackend = NdArray;

    fn config() -> SequenceModelConfig {
        SequenceModelConfig::new(vec![5], 0, 8, 1, 2, 0.0, 6)
    }

    fn test_set(n: usize) -> SequenceDataset {
        SequenceDataset::new(
            (0..n)
                .map(|i| InteractionSequence {
                    categorical: vec![vec![(i % 5) as u32; 3]],
                    continuous: Vec::new(),
                    correct: vec![1.0, 0.0, 1.0],
                })
                .collect(),
        )
    }

    #[test]
    fn test_predicts_one_value_per_sequence() {
        let tmp = tempfile::tempdir().unwrap();
        let checkpoints = CheckpointManager::new(tmp.path()).unwrap();
        let device = Default::default();

        let trained: LstmModel<TestBackend> = LstmModel::init(&config(), &device);
        checkpoints.save_checkpoint::<TestBackend, _>(&trained, 3).unwrap();

        let inferencer =
            Inferencer::<TestBackend, LstmModel<TestBackend>>::from_checkpoint(&checkpoints, &config(), device)
                .unwrap();
        assert_eq!(inferencer.epoch(), 3);

        let loader = DataLoaderBuilder::new(SequenceBatcher::<TestBackend>::new(device, 6))
            .batch_size(4)
            .build(test_set(7));
        let preds = inferencer.predict(loader.as_ref()).unwrap();

        assert_eq!(preds.len(), 7);
        assert!(preds.iter().all(|p| *p > 0.0 && *p < 1.0));
    }

    #[test]
    fn test_checkpoint_from_other_architecture_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let checkpoints = CheckpointManager::new(tmp.path()).unwrap();
        let device = Default::default();

        let trained: LstmModel<TestBackend> = LstmModel::init(&config(), &device);
        checkpoints.save_checkpoint::<TestBackend, _>(&trained, 1).unwrap();

        let result =
            Inferencer::<TestBackend, BertModel<TestBackend>>::from_checkpoint(&checkpoints, &config(), device);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_checkpoint_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let checkpoints = CheckpointManager::open(tmp.path());
        let result = Inferencer::<TestBackend, LstmModel<TestBackend>>::from_checkpoint(
            &checkpoints,
            &config(),
            Default::default(),
        );
        assert!(result.is_err());
    }
}
