use burn::data::dataset::Dataset;

use crate::domain::sample::EncodedSample;

/// Padded samples, all of the same length, ready for batching.
pub struct DistillDataset {
    samples: Vec<EncodedSample>,
}

impl DistillDataset {
    pub fn new(samples: Vec<EncodedSample>) -> Self { Self { samples } }

    pub fn sample_count(&self) -> usize { self.samples.len() }

    /// True when every sample carries a label id.
    pub fn is_labelled(&self) -> bool {
        !self.samples.is_empty() && self.samples.iter().all(|s| s.label_id.is_some())
    }
}

impl Dataset<EncodedSample> for DistillDataset {
    fn get(&self, index: usize) -> Option<EncodedSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
