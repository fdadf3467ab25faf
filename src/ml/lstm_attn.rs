// ============================================================
// Layer 5 — LSTM + Attention Model
// ============================================================
// The LSTM stack followed by one transformer encoder layer.
// Padded steps (mask == 0) are hidden from attention.

use burn::{
    nn::{
        transformer::{TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput},
        Dropout, DropoutConfig, Linear, Lstm,
    },
    prelude::*,
};

use crate::ml::lstm::{init_lstm_stack, run_lstm_stack};
use crate::ml::model::{predict_head, InteractionEmbedding, SequenceModel, SequenceModelConfig};
use crate::ml::preprocess::ModelInput;

/// Embeddings → stacked LSTM → one self-attention encoder layer
/// over the LSTM states → per-step head.
#[derive(Module, Debug)]
pub struct LstmAttnModel<B: Backend> {
    pub embedding: InteractionEmbedding<B>,
    pub layers: Vec<Lstm<B>>,
    pub attention: TransformerEncoder<B>,
    pub dropout: Dropout,
    pub head: Linear<B>,
}

impl<B: Backend> SequenceModel<B> for LstmAttnModel<B> {
    fn init(config: &SequenceModelConfig, device: &B::Device) -> Self {
        let attention = TransformerEncoderConfig::new(
            config.hidden_dim,
            config.hidden_dim * 4,
            config.n_heads,
            1,
        )
        .with_dropout(config.dropout)
        .init(device);

        Self {
            embedding: config.init_embedding(device),
            layers: init_lstm_stack(config, device),
            attention,
            dropout: DropoutConfig::new(config.dropout).init(),
            head: config.init_head(device),
        }
    }

    fn forward(&self, input: &ModelInput<B>) -> Tensor<B, 2> {
        let x = self.embedding.forward(input);
        let x = run_lstm_stack(&self.layers, x);

        // true where the step is padding
        let pad_mask = input.mask.clone().equal_elem(0.0);
        let x = self
            .attention
            .forward(TransformerEncoderInput::new(x).mask_pad(pad_mask));

        predict_head(&self.head, self.dropout.forward(x))
    }
}
