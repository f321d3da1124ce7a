// ============================================================
// Layer 4 — Distillation Batcher
// ============================================================
// Implements Burn's Batcher trait to stack padded samples into
// the tensors both encoders read:
//
//   input_ids     [batch, seq]   Int
//   input_mask    [batch, seq]   Int   (1 = real token)
//   segment_ids   [batch, seq]   Int
//   label_ids     [batch]        Int   (only if every sample has one)
//   sample_weight [batch]        Float (only if any sample has one;
//                                       the rest default to 1.0)
//
// Samples must already be padded to one common length
// (see EncodedSample::padded).
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::sample::EncodedSample;

// ─── DistillBatch ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct DistillBatch<B: Backend> {
    pub input_ids:      Tensor<B, 2, Int>,
    pub input_mask:     Tensor<B, 2, Int>,
    pub segment_ids:    Tensor<B, 2, Int>,
    pub label_ids:      Option<Tensor<B, 1, Int>>,
    pub sample_weight:  Option<Tensor<B, 1>>,
}

impl<B: Backend> DistillBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.input_ids.dims()[0]
    }

    /// Per-sample loss weights, all ones when the batch carries none.
    pub fn weights(&self) -> Tensor<B, 1> {
        match &self.sample_weight {
            Some(w) => w.clone(),
            None    => Tensor::ones([self.batch_size()], &self.input_ids.device()),
        }
    }
}

// ─── DistillBatcher ───────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct DistillBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> DistillBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn int_matrix(&self, rows: Vec<i32>, batch_size: usize, seq_len: usize) -> Tensor<B, 2, Int> {
        Tensor::from_data(TensorData::new(rows, [batch_size, seq_len]), &self.device)
    }
}

impl<B: Backend> Batcher<EncodedSample, DistillBatch<B>> for DistillBatcher<B> {
    fn batch(&self, items: Vec<EncodedSample>) -> DistillBatch<B> {
        let batch_size = items.len();
        let seq_len    = items.first().map_or(0, |s| s.input_ids.len());

        let input_ids   = self.int_matrix(flatten(&items, |s| s.input_ids.as_slice()),   batch_size, seq_len);
        let input_mask  = self.int_matrix(flatten(&items, |s| s.input_mask.as_slice()),  batch_size, seq_len);
        let segment_ids = self.int_matrix(flatten(&items, |s| s.segment_ids.as_slice()), batch_size, seq_len);

        // Option<Vec<_>> collects to None as soon as one label is missing
        let label_ids = items
            .iter()
            .map(|s| s.label_id.map(|l| l as i32))
            .collect::<Option<Vec<i32>>>()
            .filter(|labels| !labels.is_empty())
            .map(|labels| Tensor::from_data(TensorData::new(labels, [batch_size]), &self.device));

        let sample_weight = if items.iter().any(|s| s.sample_weight.is_some()) {
            let weights: Vec<f32> = items
                .iter()
                .map(|s| s.sample_weight.unwrap_or(1.0))
                .collect();
            Some(Tensor::from_data(TensorData::new(weights, [batch_size]), &self.device))
        } else {
            None
        };

        DistillBatch { input_ids, input_mask, segment_ids, label_ids, sample_weight }
    }
}

/// Concatenate one id column of every sample, row after row.
fn flatten<F>(items: &[EncodedSample], column: F) -> Vec<i32>
where
    F: Fn(&EncodedSample) -> &[u32],
{
    items
        .iter()
        .flat_map(|s| column(s).iter().map(|&x| x as i32))
        .collect()
}
