// ============================================================
// Layer 2 — Inference Use Case
// ============================================================
//   Step 1: Load train_config.json from the model dir
//   Step 2: Load the test sequences and check them against
//           the stored feature layout
//   Step 3: Rebuild the architecture, load model.pt, predict
//   Step 4: Write <output_dir>/<run_name>-output[_<fold>].csv

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use burn::{
    backend::{NdArray, Wgpu},
    data::dataloader::DataLoaderBuilder,
    prelude::*,
};

use crate::application::{train_use_case::TrainConfig, ComputeDevice};
use crate::data::{batcher::SequenceBatcher, dataset::SequenceDataset, loader::JsonlSequenceLoader};
use crate::domain::{sequence::InteractionSequence, traits::SequenceSource};
use crate::infra::{
    checkpoint::CheckpointManager,
    predictions::{output_path, write_predictions},
};
use crate::ml::{
    bert::BertModel,
    inferencer::Inferencer,
    lstm::LstmModel,
    lstm_attn::LstmAttnModel,
    model::{ModelKind, SequenceModel},
};

/// Overrides on top of the stored training config.
#[derive(Debug, Clone, Default)]
pub struct InferenceOptions {
    pub test_file: Option<String>,
    pub output_dir: Option<String>,
    pub device: Option<ComputeDevice>,
    pub batch_size: Option<usize>,
}

pub struct InferenceUseCase {
    checkpoints: CheckpointManager,
    options: InferenceOptions,
}

impl InferenceUseCase {
    pub fn new(model_dir: impl Into<PathBuf>, options: InferenceOptions) -> Self {
        Self { checkpoints: CheckpointManager::open(model_dir), options }
    }

    /// Returns the written CSV and the number of rows in it.
    pub fn execute(&self) -> Result<(PathBuf, usize)> {
        // ── Step 1: Stored config ─────────────────────────────────────────────
        let mut cfg = self.checkpoints.load_config()?;
        if let Some(output_dir) = &self.options.output_dir {
            cfg.output_dir = output_dir.clone();
        }
        if let Some(device) = self.options.device {
            cfg.device = device;
        }
        if let Some(batch_size) = self.options.batch_size {
            cfg.batch_size = batch_size;
        }
        ensure!(cfg.batch_size > 0, "batch_size must be positive");

        // ── Step 2: Test sequences ────────────────────────────────────────────
        let test_file = self
            .options
            .test_file
            .clone()
            .or_else(|| cfg.test_file.clone())
            .context("No test file given and none recorded in the training config")?;

        tracing::info!("Loading test sequences from '{}'", test_file);
        let sequences = JsonlSequenceLoader::new(&test_file).load_all()?;
        for (i, seq) in sequences.iter().enumerate() {
            cfg.meta
                .check(seq)
                .with_context(|| format!("Test sequence {i} does not fit the trained model"))?;
        }
        let n_sequences = sequences.len();

        // ── Step 3: Predict ───────────────────────────────────────────────────
        let predictions = match cfg.device {
            ComputeDevice::Cpu => predict_on_backend::<NdArray>(
                &cfg,
                &self.checkpoints,
                burn::backend::ndarray::NdArrayDevice::Cpu,
                sequences,
            )?,
            ComputeDevice::Gpu => predict_on_backend::<Wgpu>(
                &cfg,
                &self.checkpoints,
                burn::backend::wgpu::WgpuDevice::default(),
                sequences,
            )?,
        };
        ensure!(
            predictions.len() == n_sequences,
            "Got {} predictions for {} test sequences",
            predictions.len(),
            n_sequences
        );

        // ── Step 4: Write ─────────────────────────────────────────────────────
        let path = output_path(&cfg.output_dir, &cfg.run_name, cfg.fold);
        write_predictions(&path, &predictions)?;
        Ok((path, predictions.len()))
    }
}

fn predict_on_backend<B: Backend>(
    cfg: &TrainConfig,
    checkpoints: &CheckpointManager,
    device: B::Device,
    sequences: Vec<InteractionSequence>,
) -> Result<Vec<f32>> {
    match ModelKind::from_name(&cfg.model)? {
        ModelKind::Lstm => predict_with::<B, LstmModel<B>>(cfg, checkpoints, device, sequences),
        ModelKind::LstmAttn => predict_with::<B, LstmAttnModel<B>>(cfg, checkpoints, device, sequences),
        ModelKind::Bert => predict_with::<B, BertModel<B>>(cfg, checkpoints, device, sequences),
    }
}

fn predict_with<B: Backend, M: SequenceModel<B>>(
    cfg: &TrainConfig,
    checkpoints: &CheckpointManager,
    device: B::Device,
    sequences: Vec<InteractionSequence>,
) -> Result<Vec<f32>> {
    let inferencer = Inferencer::<B, M>::from_checkpoint(checkpoints, &cfg.model_config(), device.clone())?;
    tracing::info!("Using checkpoint from epoch {}", inferencer.epoch());

    // no shuffle: row i of the output is test sequence i
    let loader = DataLoaderBuilder::new(SequenceBatcher::<B>::new(device, cfg.max_seq_len))
        .batch_size(cfg.batch_size)
        .build(SequenceDataset::new(sequences));

    inferencer.predict(loader.as_ref())
}
