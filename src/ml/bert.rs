// ============================================================
// Layer 5 — BERT-style Encoder Model
// ============================================================
// Embeddings plus learned absolute position embeddings, fed to
// an `n_layers` transformer encoder with the padding mask.

use burn::{
    nn::{
        transformer::{TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput},
        Dropout, DropoutConfig, Embedding, EmbeddingConfig, Linear,
    },
    prelude::*,
};

use crate::ml::model::{predict_head, InteractionEmbedding, SequenceModel, SequenceModelConfig};
use crate::ml::preprocess::ModelInput;

/// Embeddings + learned positions → transformer encoder →
/// per-step head.
#[derive(Module, Debug)]
pub struct BertModel<B: Backend> {
    pub embedding: InteractionEmbedding<B>,
    pub position_embedding: Embedding<B>,
    pub encoder: TransformerEncoder<B>,
    pub dropout: Dropout,
    pub head: Linear<B>,
}

impl<B: Backend> SequenceModel<B> for BertModel<B> {
    fn init(config: &SequenceModelConfig, device: &B::Device) -> Self {
        let encoder = TransformerEncoderConfig::new(
            config.hidden_dim,
            config.hidden_dim * 4,
            config.n_heads,
            config.n_layers,
        )
        .with_dropout(config.dropout)
        .init(device);

        Self {
            embedding: config.init_embedding(device),
            position_embedding: EmbeddingConfig::new(config.max_seq_len, config.hidden_dim).init(device),
            encoder,
            dropout: DropoutConfig::new(config.dropout).init(),
            head: config.init_head(device),
        }
    }

    fn forward(&self, input: &ModelInput<B>) -> Tensor<B, 2> {
        let [batch_size, seq_len] = input.dims();
        let x = self.embedding.forward(input);

        // learned absolute positions
        let positions: Vec<i64> = (0..batch_size)
            .flat_map(|_| 0..seq_len as i64)
            .collect();
        let positions = Tensor::<B, 2, Int>::from_data(
            TensorData::new(positions, [batch_size, seq_len]),
            &x.device(),
        );
        let x = x + self.position_embedding.forward(positions);

        let pad_mask = input.mask.clone().equal_elem(0.0);
        let x = self
            .encoder
            .forward(TransformerEncoderInput::new(x).mask_pad(pad_mask));

        predict_head(&self.head, self.dropout.forward(x))
    }
}
