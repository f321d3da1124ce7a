// ============================================================
// Layer 5 — Distillation Loss Primitives
// ============================================================
// Three building blocks of the TinyBERT objective:
//
//   layer alignment   student layer i ↔ teacher layer s·i + s − 1
//                     where s = ⌊teacher_layers / student_layers⌋
//                     (4 student / 12 teacher → teacher 2, 5, 8, 11)
//
//   weighted_mse      Σ w·(x − y)² / #(non-zero broadcast weights)
//                     per-sample weights broadcast over every
//                     non-batch dimension; 0 if all weights are 0
//
//   soft_cross_entropy  mean_i( −Σ_c p_teacher · log p_student · w_i )
//
// Reference: Jiao et al. (2020) TinyBERT §3.1, §3.2
//            Hinton et al. (2015) Distilling the Knowledge in a Neural Network

use anyhow::{ensure, Result};
use burn::{
    prelude::*,
    tensor::activation::{log_softmax, softmax},
};

/// Number of teacher layers each student layer stands in for.
pub fn layer_stride(teacher_layers: usize, student_layers: usize) -> Result<usize> {
    ensure!(student_layers > 0, "the student model needs at least one layer");
    ensure!(
        student_layers <= teacher_layers,
        "the student model ({student_layers} layers) cannot be deeper than the teacher model ({teacher_layers} layers)",
    );
    Ok(teacher_layers / student_layers)
}

/// Teacher layer (zero-based) matched with student layer `student_layer`.
pub fn aligned_teacher_layer(student_layer: usize, stride: usize) -> usize {
    stride * student_layer + stride - 1
}

/// Mean squared error with per-sample weights `[batch]`.
///
/// The denominator counts only elements whose broadcast weight is non-zero,
/// so down-weighting a sample to 0 removes it from the average.
pub fn weighted_mse<B: Backend, const D: usize>(
    predictions: Tensor<B, D>,
    targets:     Tensor<B, D>,
    weights:     Tensor<B, 1>,
) -> Tensor<B, 1> {
    let dims = predictions.dims();
    let per_sample: usize = dims.iter().skip(1).product();

    let mut weight_shape = [1usize; D];
    weight_shape[0] = dims[0];

    let squared = (predictions - targets).powf_scalar(2.0);
    let total   = (squared * weights.clone().reshape(weight_shape)).sum();

    let counted = weights
        .abs()
        .greater_elem(0.0)
        .float()
        .sum()
        .mul_scalar(per_sample as f64);

    // counted is 0 only when every weight is 0, and then total is 0 too
    total / counted.clamp_min(1.0)
}

/// Cross-entropy of the student's distribution against the teacher's
/// soft targets. The teacher distribution carries no gradient.
///
/// Each sample's cross-entropy is scaled by its own weight before the
/// batch mean: `mean_i(ce_i · w_i)`. This is not `mean(ce) · mean(w)`;
/// the two agree only when all weights are equal.
pub fn soft_cross_entropy<B: Backend>(
    teacher_logits: Tensor<B, 2>,
    student_logits: Tensor<B, 2>,
    weights:        Tensor<B, 1>,
) -> Tensor<B, 1> {
    let [batch_size, _] = student_logits.dims();

    let teacher_probs     = softmax(teacher_logits, 1).detach();
    let student_log_probs = log_softmax(student_logits, 1);

    let per_sample = (teacher_probs * student_log_probs)
        .sum_dim(1)
        .reshape([batch_size])
        .neg();

    (per_sample * weights).mean()
}
