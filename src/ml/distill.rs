// ============================================================
// Layer 5 — TinyBERT Distillation Objective
// ============================================================
// Runs the same batch through a frozen teacher model and a
// trainable student model and sums four matching losses:
//
//   embedding  MSE( Wₑ · student_emb , teacher_emb )
//   attention  Σᵢ MSE( teacher_scores[a(i)] , student_scores[i] )
//   hidden     Σᵢ MSE( teacher_layer[a(i)]  , Wᵢ · student_layer[i] )
//   prediction soft cross-entropy( teacher_logits , student_logits )
//
//   total = embedding + attention + hidden + prediction
//
// a(i) is the fixed-ratio layer alignment from loss.rs. Wₑ and
// Wᵢ lift the student's hidden width up to the teacher's; they
// are trained with the student and thrown away afterwards.
//
// The teacher model never learns: its parameters are marked
// no_grad and every activation it produces is detached before
// it enters a loss term.
//
// Reference: Jiao et al. (2020) TinyBERT §3.1
//            Burn Book §3 (Modules), §5 (Autodiff)

use anyhow::{ensure, Result};
use burn::{
    nn::Linear,
    prelude::*,
};

use crate::data::batcher::DistillBatch;
use crate::ml::classifier::{BertClassifier, ClassifierConfig, Prediction};
use crate::ml::config::BertConfig;
use crate::ml::encoder::dense_layer;
use crate::ml::loss::{aligned_teacher_layer, layer_stride, soft_cross_entropy, weighted_mse};

#[derive(Config, Debug)]
pub struct DistillorConfig {
    pub student: BertConfig,
    pub teacher: BertConfig,

    #[config(default = 2)]
    pub label_size: usize,

    #[config(default = false)]
    pub drop_pooler: bool,
}

impl DistillorConfig {
    /// Reject teacher/student pairs the objective cannot compare.
    pub fn validate(&self) -> Result<()> {
        self.student.validate()?;
        self.teacher.validate()?;
        ensure!(self.label_size > 0, "label_size must be positive");
        ensure!(
            self.student.vocab_size == self.teacher.vocab_size,
            "student and teacher models must share a vocabulary ({} vs {})",
            self.student.vocab_size,
            self.teacher.vocab_size,
        );
        ensure!(
            self.student.num_attention_heads == self.teacher.num_attention_heads,
            "attention maps are compared head by head: student has {} heads, teacher has {}",
            self.student.num_attention_heads,
            self.teacher.num_attention_heads,
        );
        layer_stride(self.teacher.num_hidden_layers, self.student.num_hidden_layers)?;
        Ok(())
    }

    /// The student's head is initialised with the teacher's range.
    pub fn student_classifier(&self) -> ClassifierConfig {
        ClassifierConfig::new(self.student.clone())
            .with_label_size(self.label_size)
            .with_drop_pooler(self.drop_pooler)
            .with_head_initializer_range(Some(self.teacher.initializer_range))
    }

    /// The teacher model is built without dropout.
    pub fn teacher_classifier(&self) -> ClassifierConfig {
        ClassifierConfig::new(self.teacher.frozen())
            .with_label_size(self.label_size)
            .with_drop_pooler(self.drop_pooler)
    }

    /// Build a distillor around a freshly initialised teacher model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<TinyBertDistillor<B>> {
        self.validate()?;
        let teacher = self.teacher_classifier().init(device);
        self.init_with_teacher(teacher, device)
    }

    /// Build a distillor around an already trained teacher model.
    pub fn init_with_teacher<B: Backend>(
        &self,
        teacher: BertClassifier<B>,
        device:  &B::Device,
    ) -> Result<TinyBertDistillor<B>> {
        self.validate()?;
        ensure!(
            teacher.encoder.num_layers() == self.teacher.num_hidden_layers
                && teacher.encoder.hidden_size == self.teacher.hidden_size
                && teacher.label_size == self.label_size,
            "teacher model does not match its config ({} layers, hidden {}, {} labels)",
            self.teacher.num_hidden_layers,
            self.teacher.hidden_size,
            self.label_size,
        );

        let stride = layer_stride(self.teacher.num_hidden_layers, self.student.num_hidden_layers)?;
        let projection = || -> Linear<B> {
            dense_layer(self.student.hidden_size, self.teacher.hidden_size, self.teacher.initializer_range, device)
        };

        tracing::info!(
            "Distilling {}x{} teacher into {}x{} student (layer stride {})",
            self.teacher.num_hidden_layers,
            self.teacher.hidden_size,
            self.student.num_hidden_layers,
            self.student.hidden_size,
            stride,
        );

        Ok(TinyBertDistillor {
            student:              self.student_classifier().init(device),
            teacher:              teacher.no_grad(),
            embedding_projection: projection(),
            hidden_projections:   (0..self.student.num_hidden_layers).map(|_| projection()).collect(),
            layer_stride:         stride,
        })
    }
}

#[derive(Module, Debug)]
pub struct TinyBertDistillor<B: Backend> {
    pub student:              BertClassifier<B>,
    pub teacher:              BertClassifier<B>,
    pub embedding_projection: Linear<B>,
    pub hidden_projections:   Vec<Linear<B>>,
    pub layer_stride:         usize,
}

/// Training-mode outputs. Every loss is a one-element tensor.
#[derive(Debug, Clone)]
pub struct DistillLosses<B: Backend> {
    pub total_loss:     Tensor<B, 1>,
    pub embedding_loss: Tensor<B, 1>,
    pub attention_loss: Tensor<B, 1>,
    pub hidden_loss:    Tensor<B, 1>,
    pub pred_loss:      Tensor<B, 1>,
    pub student_logits: Tensor<B, 2>,
    pub teacher_logits: Tensor<B, 2>,
}

/// Plain numbers read back from [`DistillLosses`] for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LossValues {
    pub total:      f64,
    pub embedding:  f64,
    pub attention:  f64,
    pub hidden:     f64,
    pub prediction: f64,
}

impl LossValues {
    pub fn add(&mut self, other: &LossValues) {
        self.total      += other.total;
        self.embedding  += other.embedding;
        self.attention  += other.attention;
        self.hidden     += other.hidden;
        self.prediction += other.prediction;
    }

    pub fn scaled(&self, factor: f64) -> LossValues {
        LossValues {
            total:      self.total * factor,
            embedding:  self.embedding * factor,
            attention:  self.attention * factor,
            hidden:     self.hidden * factor,
            prediction: self.prediction * factor,
        }
    }
}

impl<B: Backend> DistillLosses<B> {
    pub fn values(&self) -> LossValues {
        let read = |t: &Tensor<B, 1>| -> f64 { t.clone().into_scalar().elem::<f64>() };
        LossValues {
            total:      read(&self.total_loss),
            embedding:  read(&self.embedding_loss),
            attention:  read(&self.attention_loss),
            hidden:     read(&self.hidden_loss),
            prediction: read(&self.pred_loss),
        }
    }
}

impl<B: Backend> TinyBertDistillor<B> {
    pub fn student(&self) -> &BertClassifier<B> {
        &self.student
    }

    /// Teacher layer matched with each student layer.
    pub fn aligned_layers(&self) -> Vec<usize> {
        (0..self.hidden_projections.len())
            .map(|i| aligned_teacher_layer(i, self.layer_stride))
            .collect()
    }

    /// Training mode: the four loss terms and their sum.
    pub fn forward_loss(&self, batch: &DistillBatch<B>) -> DistillLosses<B> {
        let student = self.student.forward(
            batch.input_ids.clone(),
            batch.input_mask.clone(),
            batch.segment_ids.clone(),
        );
        let teacher = self
            .teacher
            .forward(
                batch.input_ids.clone(),
                batch.input_mask.clone(),
                batch.segment_ids.clone(),
            )
            .detach();
        let weights = batch.weights();
        let device  = batch.input_ids.device();

        let embedding_loss = weighted_mse(
            self.embedding_projection.forward(student.encoder.embedding_output.clone()),
            teacher.encoder.embedding_output.clone(),
            weights.clone(),
        );

        let aligned = self.aligned_layers();

        let attention_loss = aligned
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                weighted_mse(
                    teacher.encoder.attention_scores[t].clone(),
                    student.encoder.attention_scores[i].clone(),
                    weights.clone(),
                )
            })
            .fold(Tensor::zeros([1], &device), |acc, loss| acc + loss);

        let hidden_loss = aligned
            .iter()
            .zip(&self.hidden_projections)
            .enumerate()
            .map(|(i, (&t, projection))| {
                weighted_mse(
                    teacher.encoder.all_encoder_layers[t].clone(),
                    projection.forward(student.encoder.all_encoder_layers[i].clone()),
                    weights.clone(),
                )
            })
            .fold(Tensor::zeros([1], &device), |acc, loss| acc + loss);

        let pred_loss = soft_cross_entropy(teacher.logits.clone(), student.logits.clone(), weights);

        let total_loss = embedding_loss.clone()
            + attention_loss.clone()
            + hidden_loss.clone()
            + pred_loss.clone();

        DistillLosses {
            total_loss,
            embedding_loss,
            attention_loss,
            hidden_loss,
            pred_loss,
            student_logits: student.logits,
            teacher_logits: teacher.logits,
        }
    }

    /// Inference mode: student probabilities and predictions only.
    pub fn predict(&self, batch: &DistillBatch<B>) -> Prediction<B> {
        self.student.predict(
            batch.input_ids.clone(),
            batch.input_mask.clone(),
            batch.segment_ids.clone(),
        )
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::DistillBatcher;
    use crate::domain::sample::EncodedSample;
    use burn::{
        backend::{Autodiff, NdArray},
        data::dataloader::batcher::Batcher,
    };

    type TestBackend  = NdArray;
    type TestAutodiff = Autodiff<NdArray>;

    fn encoder(layers: usize, hidden: usize) -> BertConfig {
        BertConfig::new(40)
            .with_hidden_size(hidden)
            .with_num_hidden_layers(layers)
            .with_num_attention_heads(2)
            .with_intermediate_size(hidden * 2)
            .with_max_position_embeddings(8)
    }

    fn config() -> DistillorConfig {
        DistillorConfig::new(encoder(2, 8), encoder(4, 12))
    }

    fn batch<B: Backend>(weights: Option<[f32; 2]>) -> DistillBatch<B> {
        let mut a = EncodedSample::new(vec![1, 5, 9, 2]).padded(6);
        let mut b = EncodedSample::new(vec![1, 7, 2]).padded(6);
        if let Some([wa, wb]) = weights {
            a = a.with_weight(wa);
            b = b.with_weight(wb);
        }
        DistillBatcher::<B>::new(Default::default()).batch(vec![a, b])
    }

    fn scalar<B: Backend>(t: Tensor<B, 1>) -> f64 {
        t.into_scalar().elem::<f64>()
    }

    #[test]
    fn test_validation_rejects_deeper_student() {
        let cfg = DistillorConfig::new(encoder(6, 8), encoder(4, 12));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_head_mismatch() {
        let cfg = DistillorConfig::new(encoder(2, 8), encoder(4, 12).with_num_attention_heads(3));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_vocab_mismatch() {
        let student = BertConfig { vocab_size: 41, ..encoder(2, 8) };
        let cfg = DistillorConfig::new(student, encoder(4, 12));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_teacher_is_built_without_dropout() {
        let teacher = config().teacher_classifier();
        assert_eq!(teacher.encoder.hidden_dropout_prob, 0.0);
        assert_eq!(teacher.encoder.attention_probs_dropout_prob, 0.0);
    }

    #[test]
    fn test_alignment_uses_last_layer_of_each_block() {
        let model = config().init::<TestBackend>(&Default::default()).unwrap();
        assert_eq!(model.aligned_layers(), vec![1, 3]);
        assert_eq!(model.hidden_projections.len(), 2);
    }

    #[test]
    fn test_total_is_sum_of_terms() {
        let model  = config().init::<TestBackend>(&Default::default()).unwrap();
        let losses = model.forward_loss(&batch(None)).values();

        let sum = losses.embedding + losses.attention + losses.hidden + losses.prediction;
        assert!((losses.total - sum).abs() < 1e-4);
        assert!(losses.embedding > 0.0);
        assert!(losses.attention >= 0.0);
        assert!(losses.hidden > 0.0);
        assert!(losses.prediction > 0.0);
    }

    #[test]
    fn test_zero_weights_zero_every_mse_term() {
        let model  = config().init::<TestBackend>(&Default::default()).unwrap();
        let losses = model.forward_loss(&batch(Some([0.0, 0.0]))).values();
        assert_eq!(losses.embedding, 0.0);
        assert_eq!(losses.attention, 0.0);
        assert_eq!(losses.hidden, 0.0);
        assert!(losses.prediction.abs() < 1e-9);
        assert!(losses.total.is_finite());
    }

    #[test]
    fn test_gradients_reach_student_but_not_teacher() {
        let model  = config().init::<TestAutodiff>(&Default::default()).unwrap();
        let losses = model.forward_loss(&batch(None));
        let grads  = losses.total_loss.backward();

        assert!(model.student.cls.weight.val().grad(&grads).is_some());
        assert!(model.embedding_projection.weight.val().grad(&grads).is_some());
        assert!(model.hidden_projections[1].weight.val().grad(&grads).is_some());
        assert!(model.teacher.cls.weight.val().grad(&grads).is_none());
        assert!(model
            .teacher
            .encoder
            .embeddings
            .word_embeddings
            .weight
            .val()
            .grad(&grads)
            .is_none());
    }

    #[test]
    fn test_predict_runs_student_only() {
        let model = config().with_label_size(3).init::<TestBackend>(&Default::default()).unwrap();
        let pred  = model.predict(&batch(None));
        assert_eq!(pred.probs.dims(), [2, 3]);
        assert_eq!(pred.preds.dims(), [2]);
        assert_eq!(scalar(pred.probs.sum()).round(), 2.0);
    }

    #[test]
    fn test_projection_and_head_biases_start_at_zero() {
        let model = config().init::<TestBackend>(&Default::default()).unwrap();
        let max_bias = |linear: &Linear<TestBackend>| {
            linear.bias.as_ref().unwrap().val().abs().max().into_scalar()
        };
        assert_eq!(max_bias(&model.embedding_projection), 0.0);
        assert!(model.hidden_projections.iter().all(|p| max_bias(p) == 0.0));
        assert_eq!(max_bias(&model.student.cls), 0.0);
        assert_eq!(max_bias(&model.teacher.cls), 0.0);
    }

    #[test]
    fn test_student_head_uses_teacher_initializer_range() {
        let cfg = DistillorConfig::new(encoder(2, 8), encoder(4, 12).with_initializer_range(0.05));
        assert_eq!(cfg.student_classifier().head_initializer_range, Some(0.05));
    }

    fn mse(a: Tensor<TestBackend, 4>, b: Tensor<TestBackend, 4>) -> f64 {
        scalar((a - b).powf_scalar(2.0).mean())
    }

    fn mse3(a: Tensor<TestBackend, 3>, b: Tensor<TestBackend, 3>) -> f64 {
        scalar((a - b).powf_scalar(2.0).mean())
    }

    #[test]
    fn test_layer_terms_read_aligned_teacher_layers() {
        // 12 / 5 gives stride 2: teacher layers 1, 3, 5, 7, 9
        let model = DistillorConfig::new(encoder(5, 8), encoder(12, 12))
            .init::<TestBackend>(&Default::default())
            .unwrap();
        assert_eq!(model.aligned_layers(), vec![1, 3, 5, 7, 9]);

        let batch  = batch::<TestBackend>(None);
        let losses = model.forward_loss(&batch).values();

        let run = |m: &BertClassifier<TestBackend>| {
            m.forward(batch.input_ids.clone(), batch.input_mask.clone(), batch.segment_ids.clone())
        };
        let student = run(&model.student);
        let teacher = run(&model.teacher);

        let mut attention = 0.0;
        let mut hidden    = 0.0;
        for (i, &t) in model.aligned_layers().iter().enumerate() {
            attention += mse(
                teacher.encoder.attention_scores[t].clone(),
                student.encoder.attention_scores[i].clone(),
            );
            hidden += mse3(
                teacher.encoder.all_encoder_layers[t].clone(),
                model.hidden_projections[i].forward(student.encoder.all_encoder_layers[i].clone()),
            );
        }
        let embedding = mse3(
            teacher.encoder.embedding_output.clone(),
            model.embedding_projection.forward(student.encoder.embedding_output.clone()),
        );

        assert!((losses.attention - attention).abs() < 1e-4 * attention.max(1.0));
        assert!((losses.hidden - hidden).abs() < 1e-4 * hidden.max(1.0));
        assert!((losses.embedding - embedding).abs() < 1e-4 * embedding.max(1.0));
    }

    #[test]
    fn test_zero_weight_sample_drops_out_of_mse_terms() {
        let model = DistillorConfig::new(encoder(5, 8), encoder(12, 12))
            .init::<TestBackend>(&Default::default())
            .unwrap();

        let weighted = model.forward_loss(&batch(Some([1.0, 0.0]))).values();

        let first = EncodedSample::new(vec![1, 5, 9, 2]).padded(6);
        let alone = DistillBatcher::<TestBackend>::new(Default::default()).batch(vec![first]);
        let alone = model.forward_loss(&alone).values();

        let close = |a: f64, b: f64| (a - b).abs() < 1e-4 * b.abs().max(1.0);
        assert!(close(weighted.embedding, alone.embedding));
        assert!(close(weighted.attention, alone.attention));
        assert!(close(weighted.hidden, alone.hidden));
        // the prediction term averages over the whole batch
        assert!(close(weighted.prediction, alone.prediction / 2.0));
    }

    #[test]
    fn test_mismatched_teacher_model_rejected() {
        let device = Default::default();
        let cfg    = config();
        let wrong  = ClassifierConfig::new(encoder(6, 12)).init::<TestBackend>(&device);
        assert!(cfg.init_with_teacher(wrong, &device).is_err());
    }
}
