// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model, loss and training-loop code lives here.
//
//   config.rs     — BertConfig, the encoder hyper-parameters
//   encoder.rs    — BERT encoder exposing every layer's hidden
//                   states and raw attention scores
//   classifier.rs — encoder + linear head over the pooled output
//   loss.rs       — weighted MSE, soft cross-entropy, layer mapping
//   distill.rs    — TinyBertDistillor: student, frozen teacher and
//                   the projections that bridge their widths
//   trainer.rs    — distillation epoch loop with validation
//   finetuner.rs  — cross-entropy epoch loop (teacher training)
//   inferencer.rs — checkpoint loading and batched prediction
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Devlin et al. (2019) BERT
//            Jiao et al. (2020) TinyBERT

/// Encoder hyper-parameters
pub mod config;

/// BERT encoder
pub mod encoder;

/// Sequence classifier on top of the encoder
pub mod classifier;

/// Distillation loss functions
pub mod loss;

/// Teacher/student distillation model
pub mod distill;

/// Distillation training loop
pub mod trainer;

/// Classifier fine-tuning loop
pub mod finetuner;

/// Batched prediction from a checkpoint
pub mod inferencer;

/// Backend used with `--cpu`
pub type CpuBackend = burn::backend::NdArray;

/// Default GPU backend
pub type GpuBackend = burn::backend::Wgpu;
