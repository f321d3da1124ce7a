// ============================================================
// Layer 3 — EncodedSample Domain Type
// ============================================================
// One pre-tokenised example, exactly as the encoders consume it.
// Tokenisation happens upstream; this crate only ever sees ids.
//
//   input_ids    [CLS] tok tok [SEP] tok tok [SEP]   (token ids)
//   input_mask     1    1   1    1    1   1    1     (1 = real, 0 = pad)
//   segment_ids    0    0   0    0    1   1    1     (sentence A / B)
//
// input_mask and segment_ids may be omitted in the JSON input:
// the mask then defaults to all ones and the segments to zeros.
// label_id is only needed for fine-tuning a teacher model and for
// reporting accuracy; the distillation loss itself never reads it.
//
// Reference: Devlin et al. (2019) BERT §3.2 (Input Representation)
//            Rust Book §5 (Structs)

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Token id used for right padding.
pub const PAD_ID: u32 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedSample {
    pub input_ids: Vec<u32>,

    #[serde(default)]
    pub input_mask: Vec<u32>,

    #[serde(default)]
    pub segment_ids: Vec<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_id: Option<usize>,

    /// Per-sample loss weight; 1.0 when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_weight: Option<f32>,
}

impl EncodedSample {
    /// A single-segment sample with every position attended to.
    pub fn new(input_ids: Vec<u32>) -> Self {
        let len = input_ids.len();
        Self {
            input_ids,
            input_mask:    vec![1; len],
            segment_ids:   vec![0; len],
            label_id:      None,
            sample_weight: None,
        }
    }

    pub fn with_label(mut self, label_id: usize) -> Self {
        self.label_id = Some(label_id);
        self
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.sample_weight = Some(weight);
        self
    }

    pub fn with_segments(mut self, segment_ids: Vec<u32>) -> Self {
        self.segment_ids = segment_ids;
        self
    }

    /// Number of non-padding positions.
    pub fn real_len(&self) -> usize {
        self.input_mask.iter().filter(|&&m| m != 0).count()
    }

    /// Fill in the optional columns so all three have the same length.
    fn fill_defaults(&mut self) {
        if self.input_mask.is_empty() {
            self.input_mask = vec![1; self.input_ids.len()];
        }
        if self.segment_ids.is_empty() {
            self.segment_ids = vec![0; self.input_ids.len()];
        }
    }

    /// Check the columns line up and hold sensible values.
    /// An empty mask or segment column stands for its default.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.input_ids.is_empty(), "input_ids is empty");
        ensure!(
            self.input_mask.is_empty() || self.input_mask.len() == self.input_ids.len(),
            "input_mask has {} entries but input_ids has {}",
            self.input_mask.len(),
            self.input_ids.len(),
        );
        ensure!(
            self.segment_ids.is_empty() || self.segment_ids.len() == self.input_ids.len(),
            "segment_ids has {} entries but input_ids has {}",
            self.segment_ids.len(),
            self.input_ids.len(),
        );
        ensure!(
            self.input_mask.iter().all(|&m| m <= 1),
            "input_mask may only contain 0 or 1",
        );
        if let Some(w) = self.sample_weight {
            ensure!(w.is_finite() && w >= 0.0, "sample_weight must be finite and non-negative, got {w}");
        }
        Ok(())
    }

    /// Truncate or right-pad every column to exactly `max_seq_len`.
    /// Padding positions get id 0, mask 0 and segment 0.
    pub fn padded(mut self, max_seq_len: usize) -> Self {
        self.fill_defaults();
        for column in [&mut self.input_ids, &mut self.input_mask, &mut self.segment_ids] {
            column.truncate(max_seq_len);
            column.resize(max_seq_len, PAD_ID);
        }
        self
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_fills_mask_and_segments() {
        let s = EncodedSample::new(vec![101, 7, 8, 102]);
        assert_eq!(s.input_mask, vec![1, 1, 1, 1]);
        assert_eq!(s.segment_ids, vec![0, 0, 0, 0]);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_padding_extends_with_zeros() {
        let s = EncodedSample::new(vec![101, 7, 102]).padded(5);
        assert_eq!(s.input_ids,   vec![101, 7, 102, 0, 0]);
        assert_eq!(s.input_mask,  vec![1, 1, 1, 0, 0]);
        assert_eq!(s.segment_ids, vec![0, 0, 0, 0, 0]);
        assert_eq!(s.real_len(), 3);
    }

    #[test]
    fn test_truncation_keeps_prefix() {
        let s = EncodedSample::new(vec![1, 2, 3, 4, 5, 6])
            .with_segments(vec![0, 0, 0, 1, 1, 1])
            .padded(4);
        assert_eq!(s.input_ids,   vec![1, 2, 3, 4]);
        assert_eq!(s.segment_ids, vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_missing_columns_default_from_json() {
        let s: EncodedSample =
            serde_json::from_str(r#"{"input_ids":[101,5,102],"label_id":1}"#).unwrap();
        let s = s.padded(4);
        assert_eq!(s.input_mask, vec![1, 1, 1, 0]);
        assert_eq!(s.label_id, Some(1));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let mut s = EncodedSample::new(vec![1, 2, 3]);
        s.segment_ids = vec![0, 0];
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let s = EncodedSample::new(vec![1, 2]).with_weight(-1.0);
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_unpadded_sample_without_mask_is_valid() {
        let s: EncodedSample = serde_json::from_str(r#"{"input_ids":[101,102]}"#).unwrap();
        assert!(s.validate().is_ok());
    }
}
