// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Rebuilds a classifier from a checkpoint directory
// (classifier_config.json + newest model_epoch_N record) and
// runs it over pre-tokenised samples in fixed-size chunks.
// Output order always matches input order.

use anyhow::{ensure, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::batcher::DistillBatcher;
use crate::domain::{prediction::PredictionRecord, sample::EncodedSample};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::classifier::{BertClassifier, ClassifierConfig};

pub struct Inferencer<B: Backend> {
    model:       BertClassifier<B>,
    batcher:     DistillBatcher<B>,
    max_seq_len: usize,
}

impl<B: Backend> Inferencer<B> {
    pub fn from_checkpoint(
        ckpt_manager: &CheckpointManager,
        max_seq_len:  usize,
        device:       &B::Device,
    ) -> Result<Self> {
        // No dropout at inference
        let cfg = ckpt_manager.load_classifier_config()?;
        let cfg = ClassifierConfig { encoder: cfg.encoder.frozen(), ..cfg };
        let model: BertClassifier<B> = cfg.init(device);
        let model = ckpt_manager.load_model(model, device)?;
        Self::new(model, cfg.encoder.max_position_embeddings, max_seq_len, device)
    }

    pub fn new(
        model:         BertClassifier<B>,
        max_positions: usize,
        max_seq_len:   usize,
        device:        &B::Device,
    ) -> Result<Self> {
        ensure!(max_seq_len > 0, "max_seq_len must be at least 1");
        ensure!(
            max_seq_len <= max_positions,
            "max_seq_len {max_seq_len} exceeds the model's {max_positions} position embeddings",
        );
        tracing::info!("Classifier ready ({} labels, max_seq_len {})", model.label_size, max_seq_len);
        Ok(Self { model, batcher: DistillBatcher::new(device.clone()), max_seq_len })
    }

    pub fn predict(&self, samples: Vec<EncodedSample>, batch_size: usize) -> Result<Vec<PredictionRecord>> {
        ensure!(batch_size > 0, "batch_size must be at least 1");

        let samples: Vec<EncodedSample> = samples
            .into_iter()
            .map(|s| s.padded(self.max_seq_len))
            .collect();

        let mut records = Vec::with_capacity(samples.len());
        for chunk in samples.chunks(batch_size) {
            let batch = self.batcher.batch(chunk.to_vec());
            let prediction = self.model.predict(batch.input_ids, batch.input_mask, batch.segment_ids);

            let probs = prediction
                .probs
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| anyhow::anyhow!("Cannot read probabilities: {e:?}"))?;
            let preds = prediction
                .preds
                .into_data()
                .convert::<i64>()
                .to_vec::<i64>()
                .map_err(|e| anyhow::anyhow!("Cannot read predictions: {e:?}"))?;

            let label_size = self.model.label_size;
            for (row, label) in probs.chunks(label_size).zip(preds) {
                records.push(PredictionRecord {
                    index: records.len(),
                    label: label as usize,
                    probs: row.to_vec(),
                });
            }
        }

        tracing::debug!("Predicted {} samples", records.len());
        Ok(records)
    }
}
