// ============================================================
// Layer 5 — Sequence Models: shared pieces and the registry
// ============================================================
// Every architecture shares the same front end:
//
//   categorical ids ──► one Embedding per feature ─┐
//   (interaction last)                              ├─► concat ─► comb_proj ─► [b, s, hidden]
//   continuous values ─► Linear(n_conts → embed) ──┘
//
// and ends in Linear(hidden → 1) + sigmoid, giving one
// probability per timestep. What happens in between is what
// distinguishes `lstm`, `lstmattn` and `bert`.

use std::fmt;

use anyhow::{anyhow, ensure, Result};
use burn::{
    nn::{Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::ml::preprocess::ModelInput;

/// Interaction ids: 0 = no previous step, 1 = wrong, 2 = right.
const INTERACTION_VOCAB: usize = 3;

#[derive(Config, Debug)]
pub struct SequenceModelConfig {
    /// Distinct values per raw categorical feature
    pub cate_sizes: Vec<usize>,
    pub n_conts: usize,
    pub hidden_dim: usize,
    pub n_layers: usize,
    pub n_heads: usize,
    pub dropout: f64,
    pub max_seq_len: usize,
}

impl SequenceModelConfig {
    /// Width of each per-feature embedding.
    pub fn embed_dim(&self) -> usize {
        (self.hidden_dim / 3).max(1)
    }

    pub fn init_embedding<B: Backend>(&self, device: &B::Device) -> InteractionEmbedding<B> {
        let d = self.embed_dim();

        // +1: id 0 is reserved for padding
        let mut categorical: Vec<Embedding<B>> = self
            .cate_sizes
            .iter()
            .map(|&n| EmbeddingConfig::new(n + 1, d).init(device))
            .collect();
        categorical.push(EmbeddingConfig::new(INTERACTION_VOCAB, d).init(device));

        let continuous = (self.n_conts > 0).then(|| LinearConfig::new(self.n_conts, d).init(device));

        let n_parts = categorical.len() + usize::from(continuous.is_some());
        let comb_proj = LinearConfig::new(d * n_parts, self.hidden_dim).init(device);

        InteractionEmbedding { categorical, continuous, comb_proj }
    }

    /// Output head shared by every architecture.
    pub fn init_head<B: Backend>(&self, device: &B::Device) -> Linear<B> {
        LinearConfig::new(self.hidden_dim, 1).init(device)
    }
}

#[derive(Module, Debug)]
pub struct InteractionEmbedding<B: Backend> {
    pub categorical: Vec<Embedding<B>>,
    pub continuous: Option<Linear<B>>,
    pub comb_proj: Linear<B>,
}

impl<B: Backend> InteractionEmbedding<B> {
    /// → [batch, seq_len, hidden_dim]
    pub fn forward(&self, input: &ModelInput<B>) -> Tensor<B, 3> {
        let mut parts: Vec<Tensor<B, 3>> = self
            .categorical
            .iter()
            .zip(&input.categorical)
            .map(|(embedding, ids)| embedding.forward(ids.clone()))
            .collect();

        if let Some(projection) = &self.continuous {
            // n_conts × [b, s] → [b, s, n_conts]
            let stacked = Tensor::stack::<3>(input.continuous.clone(), 2);
            parts.push(projection.forward(stacked));
        }

        self.comb_proj.forward(Tensor::cat(parts, 2))
    }
}

/// [b, s, hidden] → per-step probabilities [b, s]
pub fn predict_head<B: Backend>(head: &Linear<B>, hidden: Tensor<B, 3>) -> Tensor<B, 2> {
    let [batch_size, seq_len, _] = hidden.dims();
    let logits = head.forward(hidden);
    burn::tensor::activation::sigmoid(logits).reshape([batch_size, seq_len])
}

// ─── SequenceModel ────────────────────────────────────────────────────────────
/// The capability every architecture provides: given a
/// preprocessed batch, one correctness probability per step.
pub trait SequenceModel<B: Backend>: Module<B> {
    fn init(config: &SequenceModelConfig, device: &B::Device) -> Self
    where
        Self: Sized;

    /// → [batch, seq_len], values in (0, 1)
    fn forward(&self, input: &ModelInput<B>) -> Tensor<B, 2>;
}

// ─── Registry ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    Lstm,
    LstmAttn,
    Bert,
}

/// Name → architecture. The application layer matches on the
/// kind to pick the concrete `SequenceModel` type.
pub const MODEL_REGISTRY: &[(&str, ModelKind)] = &[
    ("lstm", ModelKind::Lstm),
    ("lstmattn", ModelKind::LstmAttn),
    ("bert", ModelKind::Bert),
];

impl ModelKind {
    pub fn from_name(name: &str) -> Result<Self> {
        MODEL_REGISTRY
            .iter()
            .find(|(registered, _)| *registered == name)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| {
                let names: Vec<&str> = MODEL_REGISTRY.iter().map(|(n, _)| *n).collect();
                anyhow!("Model {name} not defined: choose one of: {}", names.join(", "))
            })
    }

    pub fn name(self) -> &'static str {
        MODEL_REGISTRY
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(n, _)| *n)
            .unwrap_or("unknown")
    }

    pub fn uses_attention(self) -> bool {
        matches!(self, Self::LstmAttn | Self::Bert)
    }

    /// Architecture-specific constraints on the hyper-parameters.
    pub fn check_config(self, config: &SequenceModelConfig) -> Result<()> {
        ensure!(config.hidden_dim > 0, "hidden_dim must be positive");
        ensure!(config.n_layers > 0, "n_layers must be positive");
        if self.uses_attention() {
            ensure!(
                config.n_heads > 0 && config.hidden_dim % config.n_heads == 0,
                "{} needs hidden_dim ({}) divisible by n_heads ({})",
                self,
                config.hidden_dim,
                config.n_heads
            );
        }
        Ok(())
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, data::dataloader::batcher::Batcher};

    use crate::data::batcher::SequenceBatcher;
    use crate::domain::sequence::InteractionSequence;
    use crate::ml::{bert::BertModel, lstm::LstmModel, lstm_attn::LstmAttnModel, preprocess::process_batch};

    type TestBackend = NdArray;

    fn config() -> SequenceModelConfig {
        SequenceModelConfig::new(vec![5, 3], 1, 12, 1, 2, 0.0, 4)
    }

    fn input() -> ModelInput<TestBackend> {
        let device = Default::default();
        let short = InteractionSequence {
            categorical: vec![vec![4, 1], vec![2, 0]],
            continuous: vec![vec![0.3, 0.9]],
            correct: vec![1.0, 0.0],
        };
        let long = InteractionSequence {
            categorical: vec![vec![0, 1, 2, 3, 4], vec![0, 1, 2, 0, 1]],
            continuous: vec![vec![0.1, 0.2, 0.3, 0.4, 0.5]],
            correct: vec![1.0, 1.0, 0.0, 1.0, 0.0],
        };
        let batch = SequenceBatcher::<TestBackend>::new(device, 4).batch(vec![short, long]);
        process_batch(batch, 3, &device).unwrap()
    }

    fn check_output(output: Tensor<TestBackend, 2>) {
        assert_eq!(output.dims(), [2, 4]);
        let values = output.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|p| *p > 0.0 && *p < 1.0));
    }

    #[test]
    fn test_every_architecture_predicts_per_step_probabilities() {
        let device = Default::default();
        let input = input();

        check_output(LstmModel::<TestBackend>::init(&config(), &device).forward(&input));
        check_output(LstmAttnModel::<TestBackend>::init(&config(), &device).forward(&input));
        check_output(BertModel::<TestBackend>::init(&config(), &device).forward(&input));
    }

    #[test]
    fn test_embedding_without_continuous_features() {
        let device = Default::default();
        let cfg = SequenceModelConfig::new(vec![5, 3], 0, 12, 1, 2, 0.0, 4);
        let embedding = cfg.init_embedding::<TestBackend>(&device);
        assert!(embedding.continuous.is_none());
        assert_eq!(embedding.categorical.len(), 3);
    }

    #[test]
    fn test_registry_lookup() {
        assert_eq!(ModelKind::from_name("lstm").unwrap(), ModelKind::Lstm);
        assert_eq!(ModelKind::from_name("bert").unwrap(), ModelKind::Bert);
        assert_eq!(ModelKind::LstmAttn.to_string(), "lstmattn");
    }

    #[test]
    fn test_unknown_model_lists_choices() {
        let err = ModelKind::from_name("saint").unwrap_err().to_string();
        assert!(err.contains("saint"));
        assert!(err.contains("lstm, lstmattn, bert"));
    }

    #[test]
    fn test_attention_needs_divisible_heads() {
        let mut cfg = config();
        cfg.n_heads = 5;
        assert!(ModelKind::Lstm.check_config(&cfg).is_ok());
        assert!(ModelKind::Bert.check_config(&cfg).is_err());
    }
}
