// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer asks for samples through SampleSource
// and never learns where they came from.
//
// Implementations:
//   - JsonlLoader → one JSON object per line on disk
//   - Vec<EncodedSample> → in-memory samples (tests, embedding)
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::sample::EncodedSample;

/// Any component that can produce pre-tokenised samples.
pub trait SampleSource {
    fn load_all(&self) -> Result<Vec<EncodedSample>>;
}

impl SampleSource for Vec<EncodedSample> {
    fn load_all(&self) -> Result<Vec<EncodedSample>> {
        Ok(self.clone())
    }
}
