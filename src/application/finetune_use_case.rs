// ============================================================
// Layer 2 — FinetuneUseCase
// ============================================================
// Trains the classifier that a later `distill` run uses as its
// teacher model:
//
//   Step 1: Read the encoder config       (Layer 5 - ml)
//   Step 2: Load and check the samples    (Layer 4 - data)
//   Step 3: Train / validation split      (Layer 4 - data)
//   Step 4: Save configs for later runs   (Layer 6 - infra)
//   Step 5: Run the fine-tuning loop      (Layer 5 - ml)

use anyhow::Result;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::application::{check_labels, load_samples, split_datasets, TrainingSettings};
use crate::data::dataset::DistillDataset;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    classifier::{BertClassifier, ClassifierConfig},
    config::BertConfig,
    finetuner::run_finetuning,
    CpuBackend,
    GpuBackend,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinetuneConfig {
    pub settings:    TrainingSettings,
    /// Path to a bert_config.json
    pub bert_config: String,
    pub label_size:  usize,
    pub drop_pooler: bool,
}

pub struct FinetuneUseCase {
    config: FinetuneConfig,
}

impl FinetuneUseCase {
    pub fn new(config: FinetuneConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;
        cfg.settings.validate()?;

        // ── Step 1: Model architecture ────────────────────────────────────────
        let encoder    = BertConfig::from_file(&cfg.bert_config)?;
        let classifier = ClassifierConfig::new(encoder)
            .with_label_size(cfg.label_size)
            .with_drop_pooler(cfg.drop_pooler);
        classifier.validate()?;

        // ── Step 2: Samples ───────────────────────────────────────────────────
        let samples = load_samples(&cfg.settings.data_path, cfg.settings.max_seq_len, &classifier.encoder)?;
        check_labels(&samples, cfg.label_size)?;

        // ── Step 3: Split ─────────────────────────────────────────────────────
        let (train_dataset, val_dataset) = split_datasets(samples, &cfg.settings);

        // ── Step 4: Configs ───────────────────────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.settings.checkpoint_dir)?;
        ckpt_manager.save_classifier_config(&classifier)?;
        ckpt_manager.save_run_config(cfg)?;

        // ── Step 5: Training loop ─────────────────────────────────────────────
        if cfg.settings.cpu {
            tracing::info!("Backend: NdArray (CPU)");
            train::<burn::backend::Autodiff<CpuBackend>>(cfg, &classifier, train_dataset, val_dataset, &ckpt_manager)
        } else {
            tracing::info!("Backend: Wgpu");
            train::<burn::backend::Autodiff<GpuBackend>>(cfg, &classifier, train_dataset, val_dataset, &ckpt_manager)
        }
    }
}

fn train<B: AutodiffBackend>(
    cfg:           &FinetuneConfig,
    classifier:    &ClassifierConfig,
    train_dataset: DistillDataset,
    val_dataset:   DistillDataset,
    ckpt_manager:  &CheckpointManager,
) -> Result<()> {
    let device = B::Device::default();
    let model: BertClassifier<B> = classifier.init(&device);
    run_finetuning(&cfg.settings, model, train_dataset, val_dataset, ckpt_manager, device)?;
    Ok(())
}
