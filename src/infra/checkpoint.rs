// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Everything the run leaves in `model_dir`:
//
//   model_dir/
//     model.pt           ← best model so far (epoch + weights)
//     best_dict.json     ← {"best_epoch(auc)", "auc", "acc"}
//     train_config.json  ← config, so inference rebuilds the
//                          same architecture and vocabularies
//
// model.pt layout:
//
//   [ epoch: u64 little-endian | NamedMpk record bytes ]
//
// NamedMpkBytesRecorder stores every parameter under its
// module path, so a record from a different architecture
// fails to decode instead of loading garbage. A record with
// the same layout but different tensor shapes decodes fine,
// so every parameter's shape is compared after loading.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, ensure, Context, Result};
use burn::{
    module::{ModuleVisitor, ParamId},
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::metrics::BestScore;

const MODEL_FILE: &str = "model.pt";
const BEST_FILE: &str = "best_dict.json";
const CONFIG_FILE: &str = "train_config.json";

const EPOCH_HEADER_LEN: usize = std::mem::size_of::<u64>();

type CheckpointRecorder = NamedMpkBytesRecorder<FullPrecisionSettings>;

/// Manages the files of one training run.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create model dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing run directory without creating anything.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    /// Overwrite model.pt with the given weights and epoch index.
    pub fn save_checkpoint<B: Backend, M: Module<B>>(&self, model: &M, epoch: usize) -> Result<()> {
        let path = self.model_path();

        let recorder = CheckpointRecorder::new();
        let record_bytes = <CheckpointRecorder as Recorder<B>>::record(
            &recorder,
            model.clone().into_record(),
            (),
        )
        .map_err(|e| anyhow!("Failed to serialise model for '{}': {e:?}", path.display()))?;

        let mut bytes = Vec::with_capacity(EPOCH_HEADER_LEN + record_bytes.len());
        bytes.extend_from_slice(&(epoch as u64).to_le_bytes());
        bytes.extend_from_slice(&record_bytes);

        fs::write(&path, bytes)
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        tracing::debug!("Saved checkpoint: epoch {} → '{}'", epoch, path.display());
        Ok(())
    }

    /// Load model.pt into a freshly built model of the same
    /// architecture. Returns the model and the stored epoch.
    ///
    /// Fails when the file is missing, truncated, or holds
    /// parameters that don't match `model`.
    pub fn load_checkpoint<B: Backend, M: Module<B>>(
        &self,
        model: M,
        device: &B::Device,
    ) -> Result<(M, usize)> {
        let path = self.model_path();
        let bytes = fs::read(&path).with_context(|| {
            format!("Cannot read checkpoint '{}'. Have you trained the model first?", path.display())
        })?;

        ensure!(
            bytes.len() > EPOCH_HEADER_LEN,
            "Checkpoint '{}' is truncated ({} bytes)",
            path.display(),
            bytes.len()
        );
        let (header, record_bytes) = bytes.split_at(EPOCH_HEADER_LEN);
        let mut epoch_bytes = [0u8; EPOCH_HEADER_LEN];
        epoch_bytes.copy_from_slice(header);
        let epoch = u64::from_le_bytes(epoch_bytes) as usize;

        let recorder = CheckpointRecorder::new();
        let record = <CheckpointRecorder as Recorder<B>>::load(&recorder, record_bytes.to_vec(), device)
            .map_err(|e| {
                anyhow!(
                    "Checkpoint '{}' does not match the configured model: {e:?}",
                    path.display()
                )
            })?;

        let expected = param_shapes(&model);
        let model = model.load_record(record);
        let found = param_shapes(&model);

        ensure!(
            found.len() == expected.len(),
            "Checkpoint '{}' has {} parameter tensors, the configured model has {}",
            path.display(),
            found.len(),
            expected.len()
        );
        if let Some((i, (got, want))) = found
            .iter()
            .zip(&expected)
            .enumerate()
            .find(|(_, (got, want))| got != want)
        {
            bail!(
                "Checkpoint '{}' parameter #{} has shape {:?}, the configured model expects {:?}",
                path.display(),
                i,
                got,
                want
            );
        }

        tracing::info!("Loaded checkpoint from epoch {}", epoch);
        Ok((model, epoch))
    }

    pub fn save_best(&self, best: &BestScore) -> Result<()> {
        let path = self.dir.join(BEST_FILE);
        let json = serde_json::to_string_pretty(best)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write best score to '{}'", path.display()))?;

        tracing::debug!("Saved best score to '{}'", path.display());
        Ok(())
    }

    pub fn load_best(&self) -> Result<BestScore> {
        let path = self.dir.join(BEST_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read best score from '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed best score file '{}'", path.display()))
    }

    /// Must be called before training starts so inference can
    /// reconstruct the exact model architecture.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. \
                 Make sure you have run 'train' before 'inference'.",
                path.display()
            )
        })?;

        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config file '{}'", path.display()))
    }
}

/// Shapes of every parameter tensor, in module visit order.
#[derive(Default)]
struct ShapeCollector {
    shapes: Vec<Vec<usize>>,
}

impl<B: Backend> ModuleVisitor<B> for ShapeCollector {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.shapes.push(tensor.dims().to_vec());
    }

    fn visit_int<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D, Int>) {
        self.shapes.push(tensor.dims().to_vec());
    }
}

fn param_shapes<B: Backend, M: Module<B>>(model: &M) -> Vec<Vec<usize>> {
    let mut collector = ShapeCollector::default();
    model.visit(&mut collector);
    collector.shapes
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::NdArray,
        nn::{Linear, LinearConfig},
    };

    type TestBackend = NdArray;

    fn weights(model: &Linear<TestBackend>) -> Vec<f32> {
        model.weight.val().into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_checkpoint_roundtrip_keeps_epoch_and_weights() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path()).unwrap();
        let device = Default::default();

        let saved: Linear<TestBackend> = LinearConfig::new(3, 2).init(&device);
        manager.save_checkpoint(&saved, 4).unwrap();

        let fresh: Linear<TestBackend> = LinearConfig::new(3, 2).init(&device);
        let (loaded, epoch) = manager.load_checkpoint(fresh, &device).unwrap();

        assert_eq!(epoch, 4);
        assert_eq!(weights(&loaded), weights(&saved));
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::open(tmp.path());
        let device = Default::default();
        let model: Linear<TestBackend> = LinearConfig::new(3, 2).init(&device);

        let err = manager.load_checkpoint(model, &device).unwrap_err().to_string();
        assert!(err.contains("model.pt"));
    }

    #[test]
    fn test_mismatched_architecture_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path()).unwrap();
        let device = Default::default();

        let saved: Linear<TestBackend> = LinearConfig::new(3, 2).init(&device);
        manager.save_checkpoint(&saved, 1).unwrap();

        let other: Linear<TestBackend> = LinearConfig::new(5, 4).init(&device);
        assert!(manager.load_checkpoint(other, &device).is_err());
    }

    #[test]
    fn test_swapped_shapes_with_equal_param_count_are_rejected() {
        use crate::ml::lstm::LstmModel;
        use crate::ml::model::{SequenceModel, SequenceModelConfig};

        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path()).unwrap();
        let device = Default::default();

        let config = |cate_sizes: Vec<usize>| SequenceModelConfig::new(cate_sizes, 0, 8, 1, 2, 0.0, 4);

        let saved = LstmModel::<TestBackend>::init(&config(vec![5, 3]), &device);
        manager.save_checkpoint(&saved, 1).unwrap();

        let fresh = LstmModel::<TestBackend>::init(&config(vec![3, 5]), &device);
        assert_eq!(saved.num_params(), fresh.num_params());

        let err = manager.load_checkpoint(fresh, &device).unwrap_err().to_string();
        assert!(err.contains("shape"), "{err}");
    }

    #[test]
    fn test_best_score_file_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path()).unwrap();
        let best = BestScore { best_epoch: Some(2), auc: 0.75, acc: 0.7 };

        manager.save_best(&best).unwrap();

        let raw = fs::read_to_string(tmp.path().join("best_dict.json")).unwrap();
        assert!(raw.contains("\"best_epoch(auc)\": 2"));
        assert_eq!(manager.load_best().unwrap(), best);
    }
}
