// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per epoch to <checkpoint_dir>/metrics.csv.
//
//   epoch,train_loss,val_loss,embedding,attention,hidden,prediction,agreement,accuracy
//   1,41.203311,38.940127,0.912004,30.118220,7.702113,0.207790,0.512000,
//   2,22.870015,21.533080,0.530190,15.004512,5.811877,0.186501,0.684000,
//
// The loss columns are validation means. `agreement` is the share
// of validation samples where student and teacher models predict
// the same class; `accuracy` is left empty when the validation
// set has no labels. A finetune run fills only epoch, train_loss,
// val_loss and accuracy.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::ml::distill::LossValues;

const HEADER: &str = "epoch,train_loss,val_loss,embedding,attention,hidden,prediction,agreement,accuracy";

#[derive(Debug, Clone, Default)]
pub struct EpochMetrics {
    pub epoch:      usize,
    pub train_loss: f64,
    pub val_loss:   f64,
    /// Per-term validation means (distill runs only)
    pub val_terms:  Option<LossValues>,
    pub agreement:  Option<f64>,
    pub accuracy:   Option<f64>,
}

impl EpochMetrics {
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }

    fn csv_row(&self) -> String {
        let opt = |v: Option<f64>| v.map(|x| format!("{x:.6}")).unwrap_or_default();
        let terms = self.val_terms;
        format!(
            "{},{:.6},{:.6},{},{},{},{},{},{}",
            self.epoch,
            self.train_loss,
            self.val_loss,
            opt(terms.map(|t| t.embedding)),
            opt(terms.map(|t| t.attention)),
            opt(terms.map(|t| t.hidden)),
            opt(terms.map(|t| t.prediction)),
            opt(self.agreement),
            opt(self.accuracy),
        )
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Open `<dir>/metrics.csv`, writing the header if the file is new.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot append to '{}'", self.csv_path.display()))?;
        writeln!(f, "{}", m.csv_row())?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics { epoch: 2, train_loss: 2.5, val_loss: 2.3, ..Default::default() };
        assert!(m.is_improvement(3.0));
        assert!(!m.is_improvement(2.0));
    }

    #[test]
    fn test_rows_are_appended_under_one_header() {
        let dir    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&EpochMetrics { epoch: 1, train_loss: 1.0, val_loss: 2.0, ..Default::default() }).unwrap();

        // Reopening must not write a second header
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger
            .log(&EpochMetrics {
                epoch:      2,
                train_loss: 0.5,
                val_loss:   1.5,
                val_terms:  Some(LossValues { total: 1.5, embedding: 0.1, attention: 1.0, hidden: 0.3, prediction: 0.1 }),
                agreement:  Some(0.75),
                accuracy:   None,
            })
            .unwrap();

        let text  = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "1,1.000000,2.000000,,,,,,");
        assert_eq!(lines[2], "2,0.500000,1.500000,0.100000,1.000000,0.300000,0.100000,0.750000,");
    }
}
