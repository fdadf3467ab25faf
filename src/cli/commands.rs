// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `inference`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, enums)

use clap::{Args, Subcommand, ValueEnum};

use crate::application::{
    inference_use_case::InferenceOptions, train_use_case::TrainConfig, ComputeDevice, TrackerKind,
};
use crate::domain::sequence::DatasetMeta;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a knowledge-tracing model on JSON-lines sequences
    Train(TrainArgs),

    /// Predict the last interaction of every test sequence
    Inference(InferenceArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum DeviceArg {
    Cpu,
    Gpu,
}

impl From<DeviceArg> for ComputeDevice {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Cpu => ComputeDevice::Cpu,
            DeviceArg::Gpu => ComputeDevice::Gpu,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum TrackerArg {
    Jsonl,
    None,
}

impl From<TrackerArg> for TrackerKind {
    fn from(t: TrackerArg) -> Self {
        match t {
            TrackerArg::Jsonl => TrackerKind::Jsonl,
            TrackerArg::None => TrackerKind::None,
        }
    }
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// JSON-lines file, one student sequence per line
    #[arg(long, default_value = "data/train.jsonl")]
    pub train_file: String,

    /// Test file; its categories are folded into the embedding sizes
    #[arg(long)]
    pub test_file: Option<String>,

    /// Where model.pt, best_dict.json and train_config.json go
    #[arg(long, default_value = "models")]
    pub model_dir: String,

    #[arg(long, default_value = "output")]
    pub output_dir: String,

    /// Prefix of the inference output file
    #[arg(long, default_value = "dkt")]
    pub run_name: String,

    /// lstm, lstmattn or bert
    #[arg(long, default_value = "lstm")]
    pub model: String,

    /// Most recent steps kept per sequence
    #[arg(long, default_value_t = 20)]
    pub max_seq_len: usize,

    #[arg(long, default_value_t = 64)]
    pub hidden_dim: usize,

    #[arg(long, default_value_t = 2)]
    pub n_layers: usize,

    /// Attention heads (lstmattn, bert); must divide hidden_dim
    #[arg(long, default_value_t = 2)]
    pub n_heads: usize,

    #[arg(long, default_value_t = 0.2)]
    pub drop_out: f64,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 20)]
    pub n_epochs: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    /// Gradient norm threshold
    #[arg(long, default_value_t = 10.0)]
    pub clip_grad: f64,

    /// Epochs without a better validation AUC before stopping
    #[arg(long, default_value_t = 5)]
    pub patience: usize,

    /// Log the training loss every N batches (0 = never)
    #[arg(long, default_value_t = 50)]
    pub log_steps: usize,

    /// adam or adamw
    #[arg(long, default_value = "adam")]
    pub optimizer: String,

    /// plateau, linear_warmup or constant
    #[arg(long, default_value = "plateau")]
    pub scheduler: String,

    #[arg(long, default_value_t = 0.01)]
    pub weight_decay: f64,

    /// Fraction of sequences used for training when no fold is set
    #[arg(long, default_value_t = 0.7)]
    pub train_ratio: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    /// Hold out this cross-validation fold
    #[arg(long)]
    pub fold: Option<usize>,

    #[arg(long, default_value_t = 5)]
    pub n_folds: usize,

    #[arg(long, value_enum, default_value_t = TrackerArg::Jsonl)]
    pub tracker: TrackerArg,

    #[arg(long, value_enum, default_value_t = DeviceArg::Cpu)]
    pub device: DeviceArg,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            train_file: a.train_file,
            test_file: a.test_file,
            model_dir: a.model_dir,
            output_dir: a.output_dir,
            run_name: a.run_name,
            model: a.model,
            max_seq_len: a.max_seq_len,
            hidden_dim: a.hidden_dim,
            n_layers: a.n_layers,
            n_heads: a.n_heads,
            drop_out: a.drop_out,
            batch_size: a.batch_size,
            n_epochs: a.n_epochs,
            lr: a.lr,
            clip_grad: a.clip_grad,
            patience: a.patience,
            log_steps: a.log_steps,
            optimizer: a.optimizer,
            scheduler: a.scheduler,
            weight_decay: a.weight_decay,
            train_ratio: a.train_ratio,
            seed: a.seed,
            num_workers: a.num_workers,
            fold: a.fold,
            n_folds: a.n_folds,
            tracker: a.tracker.into(),
            device: a.device.into(),
            meta: DatasetMeta::default(),
        }
    }
}

/// All arguments for the `inference` command
#[derive(Args, Debug)]
pub struct InferenceArgs {
    /// Model dir written by `train`
    #[arg(long, default_value = "models")]
    pub model_dir: String,

    /// Defaults to the test file recorded at training time
    #[arg(long)]
    pub test_file: Option<String>,

    /// Defaults to the output dir recorded at training time
    #[arg(long)]
    pub output_dir: Option<String>,

    #[arg(long, value_enum)]
    pub device: Option<DeviceArg>,

    #[arg(long)]
    pub batch_size: Option<usize>,
}

impl From<&InferenceArgs> for InferenceOptions {
    fn from(a: &InferenceArgs) -> Self {
        InferenceOptions {
            test_file: a.test_file.clone(),
            output_dir: a.output_dir.clone(),
            device: a.device.map(Into::into),
            batch_size: a.batch_size,
        }
    }
}
