// ============================================================
// Layer 4 — JSONL Sample Loader
// ============================================================
// Reads pre-tokenised samples, one JSON object per line:
//
//   {"input_ids":[101,2023,102],"input_mask":[1,1,1],"segment_ids":[0,0,0],"label_id":1}
//   {"input_ids":[101,2054,2003,102],"sample_weight":0.5}
//
// Blank lines are skipped. A malformed line fails the whole load
// with its 1-based line number so the file can be fixed.
//
// Reference: serde_json crate documentation
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::domain::sample::EncodedSample;
use crate::domain::traits::SampleSource;

pub struct JsonlLoader {
    path: PathBuf,
}

impl JsonlLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Parse samples from any buffered reader.
    pub fn parse<R: BufRead>(reader: R) -> Result<Vec<EncodedSample>> {
        let mut samples = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Cannot read line {}", index + 1))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let sample: EncodedSample = serde_json::from_str(line)
                .with_context(|| format!("Malformed sample on line {}", index + 1))?;
            samples.push(sample);
        }
        Ok(samples)
    }
}

impl SampleSource for JsonlLoader {
    fn load_all(&self) -> Result<Vec<EncodedSample>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Cannot open sample file '{}'", self.path.display()))?;
        let samples = Self::parse(BufReader::new(file))
            .with_context(|| format!("Cannot parse '{}'", self.path.display()))?;
        tracing::info!("Read {} samples from '{}'", samples.len(), self.path.display());
        Ok(samples)
    }
}
