// ============================================================
// Layer 4 — Sequence Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec of student
// sequences into one RawBatch of float tensors.
//
// Column order in the batch (each tensor is [batch, max_seq_len]):
//
//   [ cate_0 .. cate_k | cont_0 .. cont_m | correct | mask ]
//
// Sequences longer than max_seq_len keep their most recent
// steps. Shorter ones are padded at the FRONT, so the last
// column of every row is always the most recent interaction
// (the one we predict).
//
//   max_seq_len = 5, sequence [a b c]:
//     values: [0 0 a b c]
//     mask:   [0 0 1 1 1]
//
// Everything stays float here; casting to Int is the
// preprocessor's job.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::sequence::InteractionSequence;

/// A batch exactly as it comes out of the data loader.
#[derive(Debug, Clone)]
pub struct RawBatch<B: Backend> {
    /// Feature columns, then correctness, then mask
    pub columns: Vec<Tensor<B, 2>>,
}

impl<B: Backend> RawBatch<B> {
    /// [batch_size, seq_len] of the batch, taken from the mask.
    pub fn dims(&self) -> Option<[usize; 2]> {
        self.columns.last().map(|t| t.dims())
    }
}

#[derive(Clone, Debug)]
pub struct SequenceBatcher<B: Backend> {
    pub device: B::Device,
    pub max_seq_len: usize,
}

impl<B: Backend> SequenceBatcher<B> {
    pub fn new(device: B::Device, max_seq_len: usize) -> Self {
        Self { device, max_seq_len }
    }

    /// Front-pad or truncate one column to `max_seq_len`.
    fn fit(&self, values: &[f32], out: &mut Vec<f32>) {
        let keep = values.len().min(self.max_seq_len);
        let pad = self.max_seq_len - keep;
        out.extend(std::iter::repeat(0.0).take(pad));
        out.extend_from_slice(&values[values.len() - keep..]);
    }
}

impl<B: Backend> Batcher<InteractionSequence, RawBatch<B>> for SequenceBatcher<B> {
    fn batch(&self, items: Vec<InteractionSequence>) -> RawBatch<B> {
        let batch_size = items.len();
        let n_cate = items.first().map_or(0, |s| s.categorical.len());
        let n_cont = items.first().map_or(0, |s| s.continuous.len());
        let n_columns = n_cate + n_cont + 2;

        // One flat buffer per column, row-major [batch, seq].
        let mut flat: Vec<Vec<f32>> = (0..n_columns)
            .map(|_| Vec::with_capacity(batch_size * self.max_seq_len))
            .collect();

        for item in &items {
            let mut col = 0;
            for cate in &item.categorical {
                let as_f32: Vec<f32> = cate.iter().map(|&v| v as f32).collect();
                self.fit(&as_f32, &mut flat[col]);
                col += 1;
            }
            for cont in &item.continuous {
                self.fit(cont.as_slice(), &mut flat[col]);
                col += 1;
            }
            self.fit(item.correct.as_slice(), &mut flat[col]);
            self.fit(vec![1.0f32; item.len()].as_slice(), &mut flat[col + 1]);
        }

        let columns = flat
            .into_iter()
            .map(|values| {
                Tensor::<B, 2>::from_data(
                    TensorData::new(values, [batch_size, self.max_seq_len]),
                    &self.device,
                )
            })
            .collect();

        RawBatch { columns }
    }
}
