// ============================================================
// Layer 5 — Sequence Classifier
// ============================================================
// An encoder plus one linear head over the pooled output:
//
//   logits = pooled_output · Wᵀ + b      W: [label_size, hidden]
//
// Both the teacher and the student model are BertClassifiers;
// they differ only in their BertConfig. In inference mode the
// head's logits become class probabilities and a prediction.
//
// Reference: Devlin et al. (2019) BERT §4.1 (GLUE fine-tuning)

use anyhow::{ensure, Result};
use burn::{
    nn::{loss::CrossEntropyLossConfig, Linear},
    prelude::*,
    tensor::activation::softmax,
};

use crate::ml::config::BertConfig;
use crate::ml::encoder::{dense_layer, BertEncoder, EncoderOutput};

#[derive(Config, Debug)]
pub struct ClassifierConfig {
    pub encoder: BertConfig,

    /// Number of output classes
    #[config(default = 2)]
    pub label_size: usize,

    /// Use the first token's hidden state instead of the pooler
    #[config(default = false)]
    pub drop_pooler: bool,

    /// Std-dev of the head's weights; the encoder's range when unset
    pub head_initializer_range: Option<f64>,
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<()> {
        self.encoder.validate()?;
        ensure!(self.label_size > 0, "label_size must be positive");
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> BertClassifier<B> {
        let encoder = self.encoder.init_encoder(self.drop_pooler, device);
        let range = self.head_initializer_range.unwrap_or(self.encoder.initializer_range);
        let cls   = dense_layer(self.encoder.hidden_size, self.label_size, range, device);
        BertClassifier { encoder, cls, label_size: self.label_size }
    }
}

#[derive(Module, Debug)]
pub struct BertClassifier<B: Backend> {
    pub encoder:    BertEncoder<B>,
    pub cls:        Linear<B>,
    pub label_size: usize,
}

/// Encoder activations plus the head's logits `[batch, label_size]`.
#[derive(Debug, Clone)]
pub struct ClassifierOutput<B: Backend> {
    pub encoder: EncoderOutput<B>,
    pub logits:  Tensor<B, 2>,
}

impl<B: Backend> ClassifierOutput<B> {
    pub fn detach(self) -> Self {
        Self { encoder: self.encoder.detach(), logits: self.logits.detach() }
    }
}

/// Inference-mode outputs.
#[derive(Debug, Clone)]
pub struct Prediction<B: Backend> {
    /// `[batch, label_size]`, rows sum to 1
    pub probs: Tensor<B, 2>,
    /// `[batch]` argmax of `probs`
    pub preds: Tensor<B, 1, Int>,
}

impl<B: Backend> Prediction<B> {
    pub fn from_logits(logits: Tensor<B, 2>) -> Self {
        let [batch_size, _] = logits.dims();
        let probs = softmax(logits, 1);
        let preds = probs.clone().argmax(1).reshape([batch_size]);
        Self { probs, preds }
    }
}

impl<B: Backend> BertClassifier<B> {
    pub fn forward(
        &self,
        input_ids:   Tensor<B, 2, Int>,
        input_mask:  Tensor<B, 2, Int>,
        segment_ids: Tensor<B, 2, Int>,
    ) -> ClassifierOutput<B> {
        let encoder = self.encoder.forward(input_ids, input_mask, segment_ids);
        let logits  = self.cls.forward(encoder.pooled_output.clone());
        ClassifierOutput { encoder, logits }
    }

    pub fn predict(
        &self,
        input_ids:   Tensor<B, 2, Int>,
        input_mask:  Tensor<B, 2, Int>,
        segment_ids: Tensor<B, 2, Int>,
    ) -> Prediction<B> {
        Prediction::from_logits(self.forward(input_ids, input_mask, segment_ids).logits)
    }

    /// Mean cross-entropy against hard labels `[batch]`.
    pub fn forward_loss(
        &self,
        input_ids:   Tensor<B, 2, Int>,
        input_mask:  Tensor<B, 2, Int>,
        segment_ids: Tensor<B, 2, Int>,
        label_ids:   Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, ClassifierOutput<B>) {
        let output = self.forward(input_ids, input_mask, segment_ids);
        let ce = CrossEntropyLossConfig::new().init(&output.logits.device());
        let loss = ce.forward(output.logits.clone(), label_ids);
        (loss, output)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny() -> ClassifierConfig {
        let encoder = BertConfig::new(30)
            .with_hidden_size(8)
            .with_num_hidden_layers(2)
            .with_num_attention_heads(2)
            .with_intermediate_size(16)
            .with_max_position_embeddings(8);
        ClassifierConfig::new(encoder).with_label_size(3)
    }

    fn inputs() -> [Tensor<TestBackend, 2, Int>; 3] {
        let device = Default::default();
        [
            Tensor::from_data([[1, 2, 3, 4], [5, 6, 0, 0]], &device),
            Tensor::from_data([[1, 1, 1, 1], [1, 1, 0, 0]], &device),
            Tensor::from_data([[0, 0, 1, 1], [0, 0, 0, 0]], &device),
        ]
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let model = tiny().init::<TestBackend>(&Default::default());
        let [ids, mask, seg] = inputs();
        let pred = model.predict(ids, mask, seg);

        assert_eq!(pred.probs.dims(), [2, 3]);
        let sums = pred.probs.sum_dim(1).into_data().convert::<f32>().to_vec::<f32>().unwrap();
        for s in sums {
            assert!((s - 1.0).abs() < 1e-5);
        }
        let preds = pred.preds.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert!(preds.iter().all(|&p| (0..3).contains(&p)));
    }

    #[test]
    fn test_prediction_is_argmax() {
        let logits = Tensor::<TestBackend, 2>::from_floats([[0.1, 2.0, -1.0], [3.0, 0.0, 0.0]], &Default::default());
        let pred   = Prediction::from_logits(logits);
        let preds  = pred.preds.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(preds, vec![1, 0]);
    }

    #[test]
    fn test_cross_entropy_is_positive() {
        let model = tiny().init::<TestBackend>(&Default::default());
        let [ids, mask, seg] = inputs();
        let labels = Tensor::from_data([2, 0], &Default::default());
        let (loss, output) = model.forward_loss(ids, mask, seg, labels);
        assert_eq!(output.logits.dims(), [2, 3]);
        assert!(loss.into_scalar() > 0.0);
    }

    #[test]
    fn test_head_bias_starts_at_zero() {
        let model = tiny().init::<TestBackend>(&Default::default());
        let bias  = model.cls.bias.as_ref().unwrap().val();
        assert_eq!(bias.dims(), [3]);
        assert_eq!(bias.abs().max().into_scalar(), 0.0);

        let query = &model.encoder.layers[0].attention.query;
        assert_eq!(query.bias.as_ref().unwrap().val().abs().max().into_scalar(), 0.0);
        assert!(query.weight.val().abs().max().into_scalar() > 0.0);
    }

    #[test]
    fn test_head_range_override() {
        let wide   = tiny().with_head_initializer_range(Some(10.0)).init::<TestBackend>(&Default::default());
        let narrow = tiny().init::<TestBackend>(&Default::default());
        let spread = |m: &BertClassifier<TestBackend>| m.cls.weight.val().abs().max().into_scalar();
        assert!(spread(&wide) > spread(&narrow));
    }

    #[test]
    fn test_zero_labels_rejected() {
        assert!(tiny().with_label_size(0).validate().is_err());
    }
}
