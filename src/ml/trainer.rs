// ============================================================
// Layer 5 — Distillation Training Loop
// ============================================================
// Epoch loop around TinyBertDistillor::forward_loss.
//
// Burn backend split:
//   - training runs on B (an AutodiffBackend) so total_loss can
//     be back-propagated into the student and the projections
//   - model.valid() drops autodiff; validation runs on
//     B::InnerBackend and its batcher must use that backend too
//
// The teacher model's parameters are no_grad, so the gradients
// handed to Adam never contain them and they stay untouched.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{ensure, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::TrainingSettings;
use crate::data::{
    batcher::{DistillBatch, DistillBatcher},
    dataset::DistillDataset,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::distill::{LossValues, TinyBertDistillor};

/// Validation-set results of one epoch.
#[derive(Debug, Clone, Copy)]
pub struct ValidationSummary {
    pub losses:    LossValues,
    /// Share of samples where student and teacher models agree
    pub agreement: f64,
    /// Student accuracy, when every validation batch is labelled
    pub accuracy:  Option<f64>,
}

pub(crate) fn ratio(sum: f64, count: usize) -> f64 {
    if count > 0 { sum / count as f64 } else { f64::NAN }
}

/// Correct predictions in one batch; `preds` and `targets` are `[batch]`.
pub(crate) fn count_equal<B: Backend>(preds: Tensor<B, 1, Int>, targets: Tensor<B, 1, Int>) -> usize {
    preds.equal(targets).int().sum().into_scalar().elem::<i64>() as usize
}

/// Distill for `settings.epochs` epochs and return the trained model.
/// The student model is checkpointed after every epoch.
pub fn run_distillation<B: AutodiffBackend>(
    settings:      &TrainingSettings,
    mut model:     TinyBertDistillor<B>,
    train_dataset: DistillDataset,
    val_dataset:   DistillDataset,
    ckpt_manager:  &CheckpointManager,
    device:        B::Device,
) -> Result<TinyBertDistillor<B>> {
    ensure!(train_dataset.sample_count() > 0, "no training samples to distill on");

    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

    let train_loader = DataLoaderBuilder::new(DistillBatcher::<B>::new(device.clone()))
        .batch_size(settings.batch_size)
        .shuffle(settings.seed)
        .num_workers(settings.num_workers)
        .build(train_dataset);

    let val_loader = DataLoaderBuilder::new(DistillBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(settings.batch_size)
        .num_workers(settings.num_workers)
        .build(val_dataset);

    let metrics_log   = MetricsLogger::new(ckpt_manager.dir())?;
    let mut best_loss = f64::INFINITY;

    for epoch in 1..=settings.epochs {
        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let losses   = model.forward_loss(&batch);
            let loss_val = losses.total_loss.clone().into_scalar().elem::<f64>();
            ensure!(loss_val.is_finite(), "distillation loss is {loss_val} at epoch {epoch}");

            train_loss_sum += loss_val;
            train_batches  += 1;

            let grads = losses.total_loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(settings.lr, model, grads);
        }
        let avg_train_loss = ratio(train_loss_sum, train_batches);

        // ── Validation phase ──────────────────────────────────────────────────
        let summary = validate(&model.valid(), val_loader.iter());

        tracing::info!(
            "Epoch {:>3}/{} | train={:.4} | val={:.4} (emb {:.4}, att {:.4}, hid {:.4}, pred {:.4}) | agreement={:.1}%",
            epoch,
            settings.epochs,
            avg_train_loss,
            summary.losses.total,
            summary.losses.embedding,
            summary.losses.attention,
            summary.losses.hidden,
            summary.losses.prediction,
            summary.agreement * 100.0,
        );

        let metrics = EpochMetrics {
            epoch,
            train_loss: avg_train_loss,
            val_loss:   summary.losses.total,
            val_terms:  Some(summary.losses),
            agreement:  Some(summary.agreement),
            accuracy:   summary.accuracy,
        };
        if metrics.is_improvement(best_loss) {
            best_loss = metrics.val_loss;
            tracing::info!("New best validation loss {:.4} at epoch {}", best_loss, epoch);
        }
        metrics_log.log(&metrics)?;

        ckpt_manager.save_model(model.student(), epoch)?;
    }

    tracing::info!("Distillation complete; metrics in '{}'", metrics_log.csv_path().display());
    Ok(model)
}

/// Mean losses and agreement of `model` over `batches` (no autodiff).
pub fn validate<B, I>(model: &TinyBertDistillor<B>, batches: I) -> ValidationSummary
where
    B: Backend,
    I: Iterator<Item = DistillBatch<B>>,
{
    let mut sums      = LossValues::default();
    let mut n_batches = 0usize;
    let mut samples   = 0usize;
    let mut agreed    = 0usize;
    let mut correct   = 0usize;
    let mut labelled  = true;

    for batch in batches {
        let batch_size = batch.batch_size();
        let losses     = model.forward_loss(&batch);
        sums.add(&losses.values());
        n_batches += 1;
        samples   += batch_size;

        let student_preds = losses.student_logits.argmax(1).reshape([batch_size]);
        let teacher_preds = losses.teacher_logits.argmax(1).reshape([batch_size]);
        agreed += count_equal(student_preds.clone(), teacher_preds);

        match batch.label_ids {
            Some(labels) => correct += count_equal(student_preds, labels),
            None         => labelled = false,
        }
    }

    let losses = if n_batches > 0 {
        sums.scaled(1.0 / n_batches as f64)
    } else {
        LossValues { total: f64::NAN, ..Default::default() }
    };

    ValidationSummary {
        losses,
        agreement: ratio(agreed as f64, samples),
        accuracy:  (labelled && samples > 0).then(|| correct as f64 / samples as f64),
    }
}
