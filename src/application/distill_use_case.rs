// ============================================================
// Layer 2 — DistillUseCase
// ============================================================
// Distills a teacher classifier into a smaller student:
//
//   Step 1: Resolve the teacher           (Layer 6 - infra)
//             --teacher-dir     → a finetune checkpoint directory
//             --teacher-config  → a bert_config.json; the teacher
//                                 keeps its random initialisation
//   Step 2: Read the student config       (Layer 5 - ml)
//   Step 3: Load and check the samples    (Layer 4 - data)
//   Step 4: Train / validation split      (Layer 4 - data)
//   Step 5: Save configs for inference    (Layer 6 - infra)
//   Step 6: Run the distillation loop     (Layer 5 - ml)
//
// Only the student is checkpointed. The projection layers exist
// for training and are dropped with the distillor.

use anyhow::{bail, ensure, Result};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::application::{load_samples, split_datasets, TrainingSettings};
use crate::data::dataset::DistillDataset;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    classifier::BertClassifier,
    config::BertConfig,
    distill::{DistillorConfig, TinyBertDistillor},
    trainer::run_distillation,
    CpuBackend,
    GpuBackend,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistillConfig {
    pub settings:           TrainingSettings,
    /// Path to the student's bert_config.json
    pub student_config:     String,
    /// Checkpoint directory of a fine-tuned teacher
    pub teacher_dir:        Option<String>,
    /// Record file inside (or outside) `teacher_dir` to load instead of the newest epoch
    pub teacher_checkpoint: Option<String>,
    /// Teacher bert_config.json when no trained teacher is available
    pub teacher_config:     Option<String>,
    pub label_size:         usize,
    pub drop_pooler:        bool,
}

/// Where the teacher model's weights come from.
enum TeacherSource {
    Checkpoint { dir: CheckpointManager, record: Option<PathBuf> },
    Untrained,
}

pub struct DistillUseCase {
    config: DistillConfig,
}

impl DistillUseCase {
    pub fn new(config: DistillConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;
        cfg.settings.validate()?;

        // ── Step 1 + 2: Teacher and student architectures ─────────────────────
        let (distillor_cfg, teacher) = self.resolve_models()?;
        distillor_cfg.validate()?;

        // ── Step 3: Samples ───────────────────────────────────────────────────
        let samples = load_samples(&cfg.settings.data_path, cfg.settings.max_seq_len, &distillor_cfg.student)?;
        if let Some(bad) = samples.iter().filter_map(|s| s.label_id).find(|&l| l >= distillor_cfg.label_size) {
            bail!("sample label {} is out of range for {} labels", bad, distillor_cfg.label_size);
        }

        // ── Step 4: Split ─────────────────────────────────────────────────────
        let (train_dataset, val_dataset) = split_datasets(samples, &cfg.settings);

        // ── Step 5: Configs ───────────────────────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.settings.checkpoint_dir)?;
        ckpt_manager.save_classifier_config(&distillor_cfg.student_classifier())?;
        ckpt_manager.save_teacher_config(&distillor_cfg.teacher_classifier())?;
        ckpt_manager.save_run_config(cfg)?;

        // ── Step 6: Training loop ─────────────────────────────────────────────
        let run = Run { settings: &cfg.settings, distillor_cfg: &distillor_cfg, teacher: &teacher, ckpt_manager: &ckpt_manager };
        if cfg.settings.cpu {
            tracing::info!("Backend: NdArray (CPU)");
            run.train::<burn::backend::Autodiff<CpuBackend>>(train_dataset, val_dataset)
        } else {
            tracing::info!("Backend: Wgpu");
            run.train::<burn::backend::Autodiff<GpuBackend>>(train_dataset, val_dataset)
        }
    }

    fn resolve_models(&self) -> Result<(DistillorConfig, TeacherSource)> {
        let cfg     = &self.config;
        let student = BertConfig::from_file(&cfg.student_config)?;

        match (&cfg.teacher_dir, &cfg.teacher_config) {
            (Some(dir), None) => {
                ensure!(
                    !same_dir(dir, &cfg.settings.checkpoint_dir),
                    "checkpoint_dir must differ from teacher_dir, otherwise the teacher is overwritten",
                );
                let teacher_ckpt = CheckpointManager::open(dir)?;
                let teacher_cfg  = teacher_ckpt.load_classifier_config()?;
                tracing::info!("Teacher: {} ({} labels)", dir, teacher_cfg.label_size);

                let distillor_cfg = DistillorConfig::new(student, teacher_cfg.encoder)
                    .with_label_size(teacher_cfg.label_size)
                    .with_drop_pooler(teacher_cfg.drop_pooler);
                let record = cfg.teacher_checkpoint.as_ref().map(PathBuf::from);
                Ok((distillor_cfg, TeacherSource::Checkpoint { dir: teacher_ckpt, record }))
            }
            (None, Some(path)) => {
                ensure!(cfg.teacher_checkpoint.is_none(), "teacher_checkpoint needs teacher_dir");
                tracing::warn!("No trained teacher given; distilling from a randomly initialised teacher model");
                let distillor_cfg = DistillorConfig::new(student, BertConfig::from_file(path)?)
                    .with_label_size(cfg.label_size)
                    .with_drop_pooler(cfg.drop_pooler);
                Ok((distillor_cfg, TeacherSource::Untrained))
            }
            (Some(_), Some(_)) => bail!("give either teacher_dir or teacher_config, not both"),
            (None, None)       => bail!("a teacher is required: pass teacher_dir or teacher_config"),
        }
    }
}

fn same_dir(a: &str, b: &str) -> bool {
    match (Path::new(a).canonicalize(), Path::new(b).canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _              => Path::new(a) == Path::new(b),
    }
}

struct Run<'a> {
    settings:      &'a TrainingSettings,
    distillor_cfg: &'a DistillorConfig,
    teacher:       &'a TeacherSource,
    ckpt_manager:  &'a CheckpointManager,
}

impl Run<'_> {
    fn train<B: AutodiffBackend>(&self, train_dataset: DistillDataset, val_dataset: DistillDataset) -> Result<()> {
        let device    = B::Device::default();
        let distillor = self.build::<B>(&device)?;
        run_distillation(self.settings, distillor, train_dataset, val_dataset, self.ckpt_manager, device)?;
        tracing::info!("Student checkpoints written to '{}'", self.ckpt_manager.dir().display());
        Ok(())
    }

    fn build<B: AutodiffBackend>(&self, device: &B::Device) -> Result<TinyBertDistillor<B>> {
        match self.teacher {
            TeacherSource::Untrained => self.distillor_cfg.init(device),
            TeacherSource::Checkpoint { dir, record } => {
                let teacher: BertClassifier<B> = self.distillor_cfg.teacher_classifier().init(device);
                let teacher = match record {
                    Some(path) => CheckpointManager::load_record_file(path, teacher, device)?,
                    None       => dir.load_model(teacher, device)?,
                };
                self.distillor_cfg.init_with_teacher(teacher, device)
            }
        }
    }
}
