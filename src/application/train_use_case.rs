// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load train (and test) sequences   (Layer 4 - data)
//   Step 2: Derive the feature layout          (Layer 3 - domain)
//   Step 3: Split train/validation             (Layer 4 - data)
//   Step 4: Save config for inference          (Layer 6 - infra)
//   Step 5: Pick tracker, backend, model,
//           optimizer and run the controller   (Layer 5 - ml)
//
// Backend, architecture and optimizer are all chosen at run
// time from strings, but Burn wants them as types. Each choice
// is a `match` that calls one generic function further down, so
// every combination is monomorphised once.

use anyhow::{ensure, Result};
use burn::{
    backend::{Autodiff, NdArray, Wgpu},
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::application::{ComputeDevice, TrackerKind};
use crate::data::{
    batcher::SequenceBatcher,
    dataset::SequenceDataset,
    loader::JsonlSequenceLoader,
    splitter::{kfold_split, split_train_val},
};
use crate::domain::{
    sequence::{DatasetMeta, InteractionSequence},
    traits::{ExperimentTracker, NoopTracker, SequenceSource},
};
use crate::infra::{checkpoint::CheckpointManager, metrics::JsonlTracker};
use crate::ml::{
    bert::BertModel,
    controller::{ControllerSettings, RunController, RunReport},
    lstm::LstmModel,
    lstm_attn::LstmAttnModel,
    model::{ModelKind, SequenceModel, SequenceModelConfig},
    optim::{adam_config, adamw_config, OptimizerKind},
    scheduler::{LrScheduler, SchedulerKind},
    trainer::LoopSettings,
};

// ─── TrainConfig ──────────────────────────────────────────────────────────────
// Everything a run needs. Serialised to train_config.json so
// inference can rebuild the same model, including the feature
// layout (`meta`) observed in the data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub train_file: String,
    pub test_file: Option<String>,
    pub model_dir: String,
    pub output_dir: String,
    pub run_name: String,

    pub model: String,
    pub max_seq_len: usize,
    pub hidden_dim: usize,
    pub n_layers: usize,
    pub n_heads: usize,
    pub drop_out: f64,

    pub batch_size: usize,
    pub n_epochs: usize,
    pub lr: f64,
    pub clip_grad: f64,
    pub patience: usize,
    pub log_steps: usize,
    pub optimizer: String,
    pub scheduler: String,
    pub weight_decay: f64,

    pub train_ratio: f64,
    pub seed: u64,
    pub num_workers: usize,
    /// Cross-validation fold to hold out; `None` uses the ratio split
    pub fold: Option<usize>,
    pub n_folds: usize,

    pub tracker: TrackerKind,
    pub device: ComputeDevice,

    /// Filled in from the data before training starts
    pub meta: DatasetMeta,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_file: "data/train.jsonl".to_string(),
            test_file: None,
            model_dir: "models".to_string(),
            output_dir: "output".to_string(),
            run_name: "dkt".to_string(),

            model: "lstm".to_string(),
            max_seq_len: 20,
            hidden_dim: 64,
            n_layers: 2,
            n_heads: 2,
            drop_out: 0.2,

            batch_size: 64,
            n_epochs: 20,
            lr: 1e-4,
            clip_grad: 10.0,
            patience: 5,
            log_steps: 50,
            optimizer: "adam".to_string(),
            scheduler: "plateau".to_string(),
            weight_decay: 0.01,

            train_ratio: 0.7,
            seed: 42,
            num_workers: 1,
            fold: None,
            n_folds: 5,

            tracker: TrackerKind::Jsonl,
            device: ComputeDevice::Cpu,

            meta: DatasetMeta::default(),
        }
    }
}

impl TrainConfig {
    /// Reject configurations that would only fail deep inside a run.
    pub fn validate(&self) -> Result<()> {
        ModelKind::from_name(&self.model)?;
        self.optimizer.parse::<OptimizerKind>()?;
        self.scheduler.parse::<SchedulerKind>()?;

        ensure!(self.max_seq_len > 0, "max_seq_len must be positive");
        ensure!(self.batch_size > 0, "batch_size must be positive");
        ensure!(self.n_epochs > 0, "n_epochs must be positive");
        ensure!(self.patience > 0, "patience must be positive");
        ensure!(self.lr > 0.0, "lr must be positive, got {}", self.lr);
        ensure!(self.clip_grad > 0.0, "clip_grad must be positive, got {}", self.clip_grad);
        ensure!(
            (0.0..1.0).contains(&self.drop_out),
            "drop_out must be in [0, 1), got {}",
            self.drop_out
        );
        ensure!(
            self.train_ratio > 0.0 && self.train_ratio < 1.0,
            "train_ratio must be in (0, 1), got {}",
            self.train_ratio
        );
        if let Some(fold) = self.fold {
            ensure!(
                fold < self.n_folds,
                "fold {} is out of range for {} folds",
                fold,
                self.n_folds
            );
        }
        Ok(())
    }

    /// Categorical model inputs, the interaction included.
    pub fn n_cates(&self) -> usize {
        self.meta.n_cates()
    }

    pub fn model_config(&self) -> SequenceModelConfig {
        SequenceModelConfig::new(
            self.meta.cate_sizes.clone(),
            self.meta.n_conts,
            self.hidden_dim,
            self.n_layers,
            self.n_heads,
            self.drop_out,
            self.max_seq_len,
        )
    }

    fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            n_epochs: self.n_epochs,
            patience: self.patience,
            fold: self.fold,
            loop_settings: LoopSettings {
                n_cates: self.n_cates(),
                log_steps: self.log_steps,
                clip_grad: self.clip_grad,
            },
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end.
    pub fn execute(&self) -> Result<RunReport> {
        let mut cfg = self.config.clone();
        cfg.validate()?;

        // ── Step 1: Load sequences ────────────────────────────────────────────
        tracing::info!("Loading training sequences from '{}'", cfg.train_file);
        let sequences = JsonlSequenceLoader::new(&cfg.train_file).load_all()?;
        tracing::info!("Loaded {} sequences", sequences.len());

        // ── Step 2: Feature layout ────────────────────────────────────────────
        // Vocabulary sizes cover the test file too, so inference
        // never meets a category the embeddings cannot hold.
        let mut meta = DatasetMeta::from_sequences(&sequences)?;
        if let Some(test_file) = &cfg.test_file {
            let test_sequences = JsonlSequenceLoader::new(test_file).load_all()?;
            meta.merge(&DatasetMeta::from_sequences(&test_sequences)?)?;
        }
        for seq in &sequences {
            meta.check(seq)?;
        }
        tracing::info!(
            "Feature layout: {} categorical {:?}, {} continuous",
            meta.cate_sizes.len(),
            meta.cate_sizes,
            meta.n_conts
        );
        cfg.meta = meta;

        // ── Step 3: Train / validation split ──────────────────────────────────
        let (train, valid) = match cfg.fold {
            Some(fold) => kfold_split(sequences, cfg.n_folds, fold, cfg.seed)?,
            None => split_train_val(sequences, cfg.train_ratio, cfg.seed),
        };
        ensure!(
            !train.is_empty() && !valid.is_empty(),
            "Split left {} train / {} validation sequences; need at least one of each",
            train.len(),
            valid.len()
        );

        // ── Step 4: Save config for inference ─────────────────────────────────
        let checkpoints = CheckpointManager::new(&cfg.model_dir)?;
        checkpoints.save_config(&cfg)?;

        // ── Step 5: Run ───────────────────────────────────────────────────────
        let mut tracker: Box<dyn ExperimentTracker> = match cfg.tracker {
            TrackerKind::Jsonl => Box::new(JsonlTracker::new(&cfg.model_dir)?),
            TrackerKind::None => Box::new(NoopTracker),
        };

        let report = match cfg.device {
            ComputeDevice::Cpu => {
                let device = burn::backend::ndarray::NdArrayDevice::Cpu;
                tracing::info!("Using NdArray device: {:?}", device);
                run_on_backend::<Autodiff<NdArray>>(
                    &cfg,
                    device,
                    device,
                    train,
                    valid,
                    tracker.as_mut(),
                    &checkpoints,
                )?
            }
            ComputeDevice::Gpu => {
                let device = burn::backend::wgpu::WgpuDevice::default();
                tracing::info!("Using WGPU device: {:?}", device);
                run_on_backend::<Autodiff<Wgpu>>(
                    &cfg,
                    device.clone(),
                    device,
                    train,
                    valid,
                    tracker.as_mut(),
                    &checkpoints,
                )?
            }
        };

        tracing::info!(
            "Training complete after {} epochs ({}); best valid AUC {:.4}",
            report.epochs_run,
            report.phase,
            report.best.auc
        );
        Ok(report)
    }
}

fn run_on_backend<B: AutodiffBackend>(
    cfg: &TrainConfig,
    device: B::Device,
    inner_device: <B::InnerBackend as Backend>::Device,
    train: Vec<InteractionSequence>,
    valid: Vec<InteractionSequence>,
    tracker: &mut dyn ExperimentTracker,
    checkpoints: &CheckpointManager,
) -> Result<RunReport> {
    let kind = ModelKind::from_name(&cfg.model)?;
    let model_config = cfg.model_config();
    kind.check_config(&model_config)?;

    match kind {
        ModelKind::Lstm => run_model::<B, LstmModel<B>>(
            cfg, &model_config, device, inner_device, train, valid, tracker, checkpoints,
        ),
        ModelKind::LstmAttn => run_model::<B, LstmAttnModel<B>>(
            cfg, &model_config, device, inner_device, train, valid, tracker, checkpoints,
        ),
        ModelKind::Bert => run_model::<B, BertModel<B>>(
            cfg, &model_config, device, inner_device, train, valid, tracker, checkpoints,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_model<B, M>(
    cfg: &TrainConfig,
    model_config: &SequenceModelConfig,
    device: B::Device,
    inner_device: <B::InnerBackend as Backend>::Device,
    train: Vec<InteractionSequence>,
    valid: Vec<InteractionSequence>,
    tracker: &mut dyn ExperimentTracker,
    checkpoints: &CheckpointManager,
) -> Result<RunReport>
where
    B: AutodiffBackend,
    M: SequenceModel<B> + AutodiffModule<B>,
    M::InnerModule: SequenceModel<B::InnerBackend>,
{
    let model = M::init(model_config, &device);
    tracing::info!(
        "Model '{}' ready: {} parameters, hidden_dim={}, n_layers={}",
        cfg.model,
        model.num_params(),
        cfg.hidden_dim,
        cfg.n_layers
    );

    let train_dataset = SequenceDataset::new(train);
    let valid_dataset = SequenceDataset::new(valid);
    tracing::info!(
        "Datasets: {} train sequences ({} interactions), {} validation sequences ({} interactions)",
        train_dataset.sequence_count(),
        train_dataset.interaction_count(),
        valid_dataset.sequence_count(),
        valid_dataset.interaction_count()
    );

    // ── Training loader (AutodiffBackend) ─────────────────────────────────────
    let train_loader = DataLoaderBuilder::new(SequenceBatcher::<B>::new(device.clone(), cfg.max_seq_len))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(cfg.num_workers)
        .build(train_dataset);

    // ── Validation loader (InnerBackend, no autodiff overhead) ────────────────
    let valid_loader = DataLoaderBuilder::new(SequenceBatcher::<B::InnerBackend>::new(
        inner_device.clone(),
        cfg.max_seq_len,
    ))
    .batch_size(cfg.batch_size)
    .num_workers(cfg.num_workers)
    .build(valid_dataset);

    let scheduler = LrScheduler::new(cfg.scheduler.parse()?, cfg.lr, cfg.n_epochs);
    let settings = cfg.controller_settings();

    let (_model, report) = match cfg.optimizer.parse::<OptimizerKind>()? {
        OptimizerKind::Adam => {
            let optim = adam_config(cfg.weight_decay).init::<B, M>();
            RunController::<B, _>::new(settings, device, inner_device, optim, scheduler, tracker, checkpoints)
                .fit(model, train_loader.as_ref(), valid_loader.as_ref())?
        }
        OptimizerKind::AdamW => {
            let optim = adamw_config(cfg.weight_decay).init::<B, M>();
            RunController::<B, _>::new(settings, device, inner_device, optim, scheduler, tracker, checkpoints)
                .fit(model, train_loader.as_ref(), valid_loader.as_ref())?
        }
    };

    Ok(report)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use std::{fs, io::Write};

    use super::*;
    use crate::ml::controller::RunPhase;

    fn write_jsonl(path: &std::path::Path, n: usize) {
        let mut f = fs::File::create(path).unwrap();
        for i in 0..n {
            let last = i % 2;
            writeln!(
                f,
                r#"{{"categorical": [[{a}, {b}, {c}]], "continuous": [[0.1, 0.2, 0.3]], "correct": [1, 0, {last}]}}"#,
                a = i % 4,
                b = (i + 1) % 4,
                c = (i + 2) % 4,
            )
            .unwrap();
        }
    }

    fn small_config(dir: &std::path::Path) -> TrainConfig {
        let train_file = dir.join("train.jsonl");
        write_jsonl(&train_file, 40);
        TrainConfig {
            train_file: train_file.display().to_string(),
            model_dir: dir.join("models").display().to_string(),
            output_dir: dir.join("output").display().to_string(),
            max_seq_len: 4,
            hidden_dim: 6,
            n_layers: 1,
            batch_size: 4,
            n_epochs: 2,
            lr: 1e-3,
            drop_out: 0.0,
            log_steps: 0,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cfg = TrainConfig { model: "gru".into(), ..TrainConfig::default() };
        assert!(cfg.validate().unwrap_err().to_string().contains("lstm, lstmattn, bert"));

        let cfg = TrainConfig { fold: Some(5), n_folds: 5, ..TrainConfig::default() };
        assert!(cfg.validate().is_err());

        let cfg = TrainConfig { scheduler: "cosine".into(), ..TrainConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_roundtrips_through_json_with_missing_fields() {
        let cfg: TrainConfig = serde_json::from_str(r#"{"model": "bert", "fold": 2}"#).unwrap();
        assert_eq!(cfg.model, "bert");
        assert_eq!(cfg.fold, Some(2));
        assert_eq!(cfg.max_seq_len, 20);
        assert_eq!(cfg.device, ComputeDevice::Cpu);
    }

    #[test]
    fn test_execute_trains_and_persists_run() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = small_config(tmp.path());

        let report = TrainUseCase::new(cfg.clone()).execute().unwrap();
        assert_eq!(report.phase, RunPhase::Completed);
        assert_eq!(report.epochs_run, 2);

        let checkpoints = CheckpointManager::open(&cfg.model_dir);
        let saved = checkpoints.load_config().unwrap();
        assert_eq!(saved.meta.cate_sizes, vec![4]);
        assert_eq!(saved.meta.n_conts, 1);
        assert!(checkpoints.model_path().exists());
        assert!(checkpoints.load_best().unwrap().best_epoch.is_some());

        let metrics = fs::read_to_string(tmp.path().join("models").join("metrics.jsonl")).unwrap();
        assert_eq!(metrics.lines().count(), 2);
    }
}
