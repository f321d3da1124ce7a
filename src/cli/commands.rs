// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands `finetune`, `distill` and
// `predict` with their flags. Training flags shared by the
// first two live in TrainingArgs and are flattened in.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::{
    distill_use_case::DistillConfig,
    finetune_use_case::FinetuneConfig,
    predict_use_case::PredictConfig,
    TrainingSettings,
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune a classifier on labelled samples (produces a teacher)
    Finetune(FinetuneArgs),

    /// Distill a teacher classifier into a smaller student
    Distill(DistillArgs),

    /// Predict classes with a saved classifier, one JSON line per sample
    Predict(PredictArgs),
}

/// Flags shared by every training command.
#[derive(Args, Debug)]
pub struct TrainingArgs {
    /// JSONL file of pre-tokenised samples
    #[arg(long, default_value = "data/train.jsonl")]
    pub data: String,

    /// Directory for checkpoints, configs and metrics.csv
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Sequences are truncated or padded to this many tokens
    #[arg(long, default_value_t = 128)]
    pub max_seq_len: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 3)]
    pub epochs: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 5e-5)]
    pub lr: f64,

    /// Share of samples used for training; the rest validates
    #[arg(long, default_value_t = 0.9)]
    pub train_fraction: f64,

    /// Seed for the train/validation split and batch shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Data loader worker threads
    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    /// Run on the NdArray CPU backend instead of Wgpu
    #[arg(long)]
    pub cpu: bool,
}

impl From<TrainingArgs> for TrainingSettings {
    fn from(a: TrainingArgs) -> Self {
        TrainingSettings {
            data_path:      a.data,
            checkpoint_dir: a.checkpoint_dir,
            max_seq_len:    a.max_seq_len,
            batch_size:     a.batch_size,
            epochs:         a.epochs,
            lr:             a.lr,
            train_fraction: a.train_fraction,
            seed:           a.seed,
            num_workers:    a.num_workers,
            cpu:            a.cpu,
        }
    }
}

#[derive(Args, Debug)]
pub struct FinetuneArgs {
    #[command(flatten)]
    pub training: TrainingArgs,

    /// Encoder architecture (bert_config.json)
    #[arg(long)]
    pub bert_config: String,

    /// Number of classes
    #[arg(long, default_value_t = 2)]
    pub label_size: usize,

    /// Classify from the first token's hidden state instead of the pooler
    #[arg(long)]
    pub drop_pooler: bool,
}

impl From<FinetuneArgs> for FinetuneConfig {
    fn from(a: FinetuneArgs) -> Self {
        FinetuneConfig {
            settings:    a.training.into(),
            bert_config: a.bert_config,
            label_size:  a.label_size,
            drop_pooler: a.drop_pooler,
        }
    }
}

#[derive(Args, Debug)]
pub struct DistillArgs {
    #[command(flatten)]
    pub training: TrainingArgs,

    /// Student architecture (bert_config.json)
    #[arg(long)]
    pub student_config: String,

    /// Checkpoint directory written by `finetune`
    #[arg(long, conflicts_with = "teacher_config", required_unless_present = "teacher_config")]
    pub teacher_dir: Option<String>,

    /// Load this record file instead of the newest epoch in --teacher-dir
    #[arg(long, requires = "teacher_dir", conflicts_with = "teacher_config")]
    pub teacher_checkpoint: Option<String>,

    /// Teacher architecture for an untrained teacher (smoke runs)
    #[arg(long)]
    pub teacher_config: Option<String>,

    /// Number of classes (ignored with --teacher-dir)
    #[arg(long, default_value_t = 2)]
    pub label_size: usize,

    /// Ignored with --teacher-dir
    #[arg(long)]
    pub drop_pooler: bool,
}

impl From<DistillArgs> for DistillConfig {
    fn from(a: DistillArgs) -> Self {
        DistillConfig {
            settings:           a.training.into(),
            student_config:     a.student_config,
            teacher_dir:        a.teacher_dir,
            teacher_checkpoint: a.teacher_checkpoint,
            teacher_config:     a.teacher_config,
            label_size:         a.label_size,
            drop_pooler:        a.drop_pooler,
        }
    }
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// JSONL file of pre-tokenised samples
    #[arg(long)]
    pub data: String,

    /// Checkpoint directory written by `distill` or `finetune`
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, default_value_t = 128)]
    pub max_seq_len: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Run on the NdArray CPU backend instead of Wgpu
    #[arg(long)]
    pub cpu: bool,
}

impl From<PredictArgs> for PredictConfig {
    fn from(a: PredictArgs) -> Self {
        PredictConfig {
            data_path:      a.data,
            checkpoint_dir: a.checkpoint_dir,
            max_seq_len:    a.max_seq_len,
            batch_size:     a.batch_size,
            cpu:            a.cpu,
        }
    }
}
