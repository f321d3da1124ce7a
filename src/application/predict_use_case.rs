// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Loads a classifier checkpoint (a distilled student or a
// fine-tuned teacher) and predicts a class for every sample in
// a JSONL file. Labels in the file are ignored.

use anyhow::Result;
use burn::prelude::Backend;
use serde::{Deserialize, Serialize};

use crate::application::load_samples;
use crate::domain::prediction::PredictionRecord;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{inferencer::Inferencer, CpuBackend, GpuBackend};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictConfig {
    pub data_path:      String,
    pub checkpoint_dir: String,
    pub max_seq_len:    usize,
    pub batch_size:     usize,
    pub cpu:            bool,
}

pub struct PredictUseCase {
    config: PredictConfig,
}

impl PredictUseCase {
    pub fn new(config: PredictConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Vec<PredictionRecord>> {
        if self.config.cpu {
            self.predict::<CpuBackend>()
        } else {
            self.predict::<GpuBackend>()
        }
    }

    fn predict<B: Backend>(&self) -> Result<Vec<PredictionRecord>> {
        let cfg  = &self.config;
        let ckpt = CheckpointManager::open(&cfg.checkpoint_dir)?;

        let classifier = ckpt.load_classifier_config()?;
        let samples    = load_samples(&cfg.data_path, cfg.max_seq_len, &classifier.encoder)?;

        let device     = B::Device::default();
        let inferencer = Inferencer::<B>::from_checkpoint(&ckpt, cfg.max_seq_len, &device)?;
        let records    = inferencer.predict(samples, cfg.batch_size)?;

        if !records.is_empty() {
            let mean_confidence =
                records.iter().map(|r| r.confidence() as f64).sum::<f64>() / records.len() as f64;
            tracing::info!("Predicted {} samples, mean confidence {:.3}", records.len(), mean_confidence);
        }
        Ok(records)
    }
}
