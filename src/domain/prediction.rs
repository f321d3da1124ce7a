use serde::{Deserialize, Serialize};

/// Classifier output for one input sample, printed as a JSON line by `predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Position of the sample in the input file
    pub index: usize,
    pub label: usize,
    pub probs: Vec<f32>,
}

impl PredictionRecord {
    pub fn confidence(&self) -> f32 {
        self.probs.get(self.label).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_probability_of_label() {
        let r = PredictionRecord { index: 0, label: 1, probs: vec![0.25, 0.75] };
        assert_eq!(r.confidence(), 0.75);
        assert_eq!(serde_json::to_string(&r).unwrap(), r#"{"index":0,"label":1,"probs":[0.25,0.75]}"#);
    }
}
