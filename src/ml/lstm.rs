// ============================================================
// Layer 5 — LSTM Model
// ============================================================
// Embeddings, then `n_layers` stacked LSTMs, then the shared
// per-step head. The stack helpers are public because the
// lstmattn model runs the same stack before its attention.

use burn::{
    nn::{Dropout, DropoutConfig, Linear, Lstm, LstmConfig},
    prelude::*,
};

use crate::ml::model::{predict_head, InteractionEmbedding, SequenceModel, SequenceModelConfig};
use crate::ml::preprocess::ModelInput;

/// Embeddings → stacked LSTM → per-step head.
#[derive(Module, Debug)]
pub struct LstmModel<B: Backend> {
    pub embedding: InteractionEmbedding<B>,
    pub layers: Vec<Lstm<B>>,
    pub dropout: Dropout,
    pub head: Linear<B>,
}

pub fn init_lstm_stack<B: Backend>(config: &SequenceModelConfig, device: &B::Device) -> Vec<Lstm<B>> {
    (0..config.n_layers)
        .map(|_| LstmConfig::new(config.hidden_dim, config.hidden_dim, true).init(device))
        .collect()
}

pub fn run_lstm_stack<B: Backend>(layers: &[Lstm<B>], mut x: Tensor<B, 3>) -> Tensor<B, 3> {
    for layer in layers {
        let (output, _state) = layer.forward(x, None);
        x = output;
    }
    x
}

impl<B: Backend> SequenceModel<B> for LstmModel<B> {
    fn init(config: &SequenceModelConfig, device: &B::Device) -> Self {
        Self {
            embedding: config.init_embedding(device),
            layers: init_lstm_stack(config, device),
            dropout: DropoutConfig::new(config.dropout).init(),
            head: config.init_head(device),
        }
    }

    fn forward(&self, input: &ModelInput<B>) -> Tensor<B, 2> {
        let x = self.embedding.forward(input);
        let x = run_lstm_stack(&self.layers, x);
        predict_head(&self.head, self.dropout.forward(x))
    }
}
