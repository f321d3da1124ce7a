// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers for each command:
//
//   finetune_use_case.rs — train a classifier on labelled samples
//                          (produces a teacher checkpoint)
//   distill_use_case.rs  — distill a teacher into a smaller student
//   predict_use_case.rs  — run a saved classifier over samples
//
// No model math and no printing here; only workflow coordination.
// Shared input handling (loading, padding, checking ids against
// the encoder config, splitting) lives in this file.
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{dataset::DistillDataset, loader::JsonlLoader, splitter::split_train_val};
use crate::domain::{sample::EncodedSample, traits::SampleSource};
use crate::ml::config::BertConfig;

// The fine-tuning workflow
pub mod finetune_use_case;

// The distillation workflow
pub mod distill_use_case;

// The batch prediction workflow
pub mod predict_use_case;

// ─── Training Settings ───────────────────────────────────────────────────────
// Shared by finetune and distill. Serialisable so every run
// leaves its settings next to its checkpoints (run_config.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSettings {
    pub data_path:      String,
    pub checkpoint_dir: String,
    pub max_seq_len:    usize,
    pub batch_size:     usize,
    pub epochs:         usize,
    pub lr:             f64,
    pub train_fraction: f64,
    pub seed:           u64,
    pub num_workers:    usize,
    pub cpu:            bool,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            data_path:      "data/train.jsonl".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            max_seq_len:    128,
            batch_size:     32,
            epochs:         3,
            lr:             5e-5,
            train_fraction: 0.9,
            seed:           42,
            num_workers:    1,
            cpu:            false,
        }
    }
}

impl TrainingSettings {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_seq_len > 0, "max_seq_len must be at least 1");
        ensure!(self.batch_size > 0, "batch_size must be at least 1");
        ensure!(self.epochs > 0, "epochs must be at least 1");
        ensure!(self.lr > 0.0 && self.lr.is_finite(), "learning rate must be positive");
        ensure!(self.num_workers > 0, "num_workers must be at least 1");
        Ok(())
    }
}

/// Read `path`, check every sample against `encoder` and pad to `max_seq_len`.
pub fn load_samples(path: &str, max_seq_len: usize, encoder: &BertConfig) -> Result<Vec<EncodedSample>> {
    ensure!(
        max_seq_len <= encoder.max_position_embeddings,
        "max_seq_len {} exceeds max_position_embeddings {}",
        max_seq_len,
        encoder.max_position_embeddings,
    );

    tracing::info!("Loading samples from '{}'", path);
    let samples = JsonlLoader::new(path).load_all()?;
    ensure!(!samples.is_empty(), "'{}' contains no samples", path);

    let samples = prepare_samples(samples, max_seq_len, encoder)?;
    tracing::info!("Loaded {} samples, padded to {} tokens", samples.len(), max_seq_len);
    Ok(samples)
}

/// Validate and pad in-memory samples.
pub fn prepare_samples(
    samples:     Vec<EncodedSample>,
    max_seq_len: usize,
    encoder:     &BertConfig,
) -> Result<Vec<EncodedSample>> {
    samples
        .into_iter()
        .enumerate()
        .map(|(i, sample)| {
            check_ids(&sample, encoder).with_context(|| format!("Invalid sample #{}", i + 1))?;
            let sample = sample.padded(max_seq_len);
            ensure!(sample.real_len() > 0, "Sample #{} has no attended token within max_seq_len", i + 1);
            Ok(sample)
        })
        .collect()
}

fn check_ids(sample: &EncodedSample, encoder: &BertConfig) -> Result<()> {
    sample.validate()?;
    if let Some(&id) = sample.input_ids.iter().find(|&&id| id as usize >= encoder.vocab_size) {
        anyhow::bail!("token id {id} is outside the vocabulary of {}", encoder.vocab_size);
    }
    if let Some(&seg) = sample.segment_ids.iter().find(|&&s| s as usize >= encoder.type_vocab_size) {
        anyhow::bail!("segment id {seg} exceeds type_vocab_size {}", encoder.type_vocab_size);
    }
    Ok(())
}

/// Every sample must carry a label below `label_size`.
pub fn check_labels(samples: &[EncodedSample], label_size: usize) -> Result<()> {
    for (i, sample) in samples.iter().enumerate() {
        let label = sample
            .label_id
            .with_context(|| format!("Sample #{} has no label_id", i + 1))?;
        ensure!(label < label_size, "Sample #{} has label {} but label_size is {}", i + 1, label, label_size);
    }
    Ok(())
}

/// Seeded split into training and validation datasets.
pub fn split_datasets(samples: Vec<EncodedSample>, settings: &TrainingSettings) -> (DistillDataset, DistillDataset) {
    let (train, val) = split_train_val(samples, settings.train_fraction, settings.seed);
    tracing::info!("Split: {} train, {} validation", train.len(), val.len());
    if val.is_empty() {
        tracing::warn!("Validation set is empty; validation losses will be NaN");
    }
    (DistillDataset::new(train), DistillDataset::new(val))
}
