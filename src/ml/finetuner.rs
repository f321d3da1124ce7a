// ============================================================
// Layer 5 — Fine-tuning Loop
// ============================================================
// Trains a BertClassifier on hard labels with cross-entropy.
// A finetune checkpoint directory is what `distill --teacher-dir`
// later loads as the teacher model.

use anyhow::{bail, ensure, Result};
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
use crate::ml::classifier::BertClassifier;
use crate::ml::trainer::{count_equal, ratio};

pub fn run_finetuning<B: AutodiffBackend>(
    settings:      &TrainingSettings,
    mut model:     BertClassifier<B>,
    train_dataset: DistillDataset,
    val_dataset:   DistillDataset,
    ckpt_manager:  &CheckpointManager,
    device:        B::Device,
) -> Result<BertClassifier<B>> {
    ensure!(train_dataset.sample_count() > 0, "no training samples to fine-tune on");
    ensure!(train_dataset.is_labelled(), "fine-tuning needs a label_id on every training sample");

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
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let Some(labels) = batch.label_ids else {
                bail!("training batch without labels at epoch {epoch}");
            };
            let (loss, _) = model.forward_loss(batch.input_ids, batch.input_mask, batch.segment_ids, labels);
            let loss_val  = loss.clone().into_scalar().elem::<f64>();
            ensure!(loss_val.is_finite(), "fine-tuning loss is {loss_val} at epoch {epoch}");

            train_loss_sum += loss_val;
            train_batches  += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(settings.lr, model, grads);
        }
        let avg_train_loss = ratio(train_loss_sum, train_batches);

        let (val_loss, accuracy) = evaluate(&model.valid(), val_loader.iter());

        tracing::info!(
            "Epoch {:>3}/{} | train={:.4} | val={:.4} | accuracy={}",
            epoch,
            settings.epochs,
            avg_train_loss,
            val_loss,
            accuracy.map(|a| format!("{:.1}%", a * 100.0)).unwrap_or_else(|| "n/a".into()),
        );

        let metrics = EpochMetrics {
            epoch,
            train_loss: avg_train_loss,
            val_loss,
            accuracy,
            ..Default::default()
        };
        if metrics.is_improvement(best_loss) {
            best_loss = val_loss;
            tracing::info!("New best validation loss {:.4} at epoch {}", best_loss, epoch);
        }
        metrics_log.log(&metrics)?;

        ckpt_manager.save_model(&model, epoch)?;
    }

    tracing::info!("Fine-tuning complete; metrics in '{}'", metrics_log.csv_path().display());
    Ok(model)
}

/// Mean validation loss and accuracy over the labelled batches.
/// Both are undefined (NaN / None) when no batch carries labels.
fn evaluate<B, I>(model: &BertClassifier<B>, batches: I) -> (f64, Option<f64>)
where
    B: Backend,
    I: Iterator<Item = DistillBatch<B>>,
{
    let mut loss_sum  = 0.0f64;
    let mut n_batches = 0usize;
    let mut correct   = 0usize;
    let mut total     = 0usize;

    for batch in batches {
        let Some(labels) = batch.label_ids else { continue };
        let batch_size = labels.dims()[0];

        let (loss, output) = model.forward_loss(batch.input_ids, batch.input_mask, batch.segment_ids, labels.clone());
        loss_sum  += loss.into_scalar().elem::<f64>();
        n_batches += 1;

        let preds = output.logits.argmax(1).reshape([batch_size]);
        correct += count_equal(preds, labels);
        total   += batch_size;
    }

    (ratio(loss_sum, n_batches), (total > 0).then(|| correct as f64 / total as f64))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::EncodedSample;
    use crate::ml::classifier::ClassifierConfig;
    use crate::ml::config::BertConfig;
    use burn::backend::{Autodiff, NdArray};

    type TestAutodiff = Autodiff<NdArray>;

    fn config() -> ClassifierConfig {
        let encoder = BertConfig::new(30)
            .with_hidden_size(8)
            .with_num_hidden_layers(1)
            .with_num_attention_heads(2)
            .with_intermediate_size(16)
            .with_max_position_embeddings(8);
        ClassifierConfig::new(encoder)
    }

    fn labelled(n: usize) -> Vec<EncodedSample> {
        (0..n)
            .map(|i| EncodedSample::new(vec![1, (i % 2) as u32 + 5, 2]).with_label(i % 2).padded(6))
            .collect()
    }

    #[test]
    fn test_finetuning_writes_checkpoints_and_metrics() {
        let dir      = tempfile::tempdir().unwrap();
        let ckpt     = CheckpointManager::new(dir.path()).unwrap();
        let device   = Default::default();
        let settings = TrainingSettings { epochs: 2, batch_size: 4, lr: 1e-3, ..Default::default() };

        let model: BertClassifier<TestAutodiff> = config().init(&device);
        let before = model.cls.weight.val();

        let trained = run_finetuning(
            &settings,
            model,
            DistillDataset::new(labelled(8)),
            DistillDataset::new(labelled(4)),
            &ckpt,
            device,
        )
        .unwrap();

        let moved = (trained.cls.weight.val() - before).abs().max().into_scalar();
        assert!(moved > 0.0);
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);

        let csv  = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        let last = csv.lines().last().unwrap();
        assert!(last.starts_with("2,"));
        assert!(!last.ends_with(','), "accuracy column should be filled: {last}");
    }

    #[test]
    fn test_unlabelled_data_is_rejected() {
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();
        let device = Default::default();
        let model: BertClassifier<TestAutodiff> = config().init(&device);

        let unlabelled = vec![EncodedSample::new(vec![1, 2]).padded(6)];
        let result = run_finetuning(
            &TrainingSettings::default(),
            model,
            DistillDataset::new(unlabelled),
            DistillDataset::new(Vec::new()),
            &ckpt,
            device,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_evaluate_skips_unlabelled_batches() {
        use burn::data::dataloader::batcher::Batcher;

        let device  = Default::default();
        let model: BertClassifier<NdArray> = config().init(&device);
        let batcher = DistillBatcher::<NdArray>::new(device);
        let batch   = batcher.batch(vec![EncodedSample::new(vec![1, 2]).padded(6)]);

        let (loss, accuracy) = evaluate(&model, std::iter::once(batch));
        assert!(loss.is_nan());
        assert!(accuracy.is_none());
    }
}
