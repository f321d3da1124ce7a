// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// Layout of a checkpoint directory:
//   checkpoints/
//     model_epoch_1.mpk.gz     ← classifier weights after epoch 1
//     model_epoch_2.mpk.gz
//     ...
//     latest_epoch.json        ← number of the newest epoch
//     classifier_config.json   ← architecture of the saved classifier
//     teacher_config.json      ← (distill runs) the teacher's architecture
//     run_config.json          ← CLI settings of the run
//
// Only the classifier that will be used afterwards is written:
// the student model for a distill run, the fine-tuned model for
// a finetune run. A finetune directory is therefore also a valid
// teacher source for a later distill run.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::ml::classifier::ClassifierConfig;

const LATEST_EPOCH_FILE: &str     = "latest_epoch.json";
const CLASSIFIER_CONFIG_FILE: &str = "classifier_config.json";
const TEACHER_CONFIG_FILE: &str    = "teacher_config.json";
const RUN_CONFIG_FILE: &str        = "run_config.json";

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Use `dir` for checkpoints, creating it if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing checkpoint directory without creating anything.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        anyhow::ensure!(dir.is_dir(), "Checkpoint directory '{}' does not exist", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn model_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("model_epoch_{epoch}"))
    }

    /// Write `model` for `epoch` and point latest_epoch.json at it.
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M, epoch: usize) -> Result<()> {
        let path = self.model_path(epoch);

        <CompactRecorder as Recorder<B>>::record(
            &CompactRecorder::new(),
            model.clone().into_record(),
            path.clone(),
        )
        .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest_path = self.dir.join(LATEST_EPOCH_FILE);
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write '{}'", latest_path.display()))?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Restore the newest epoch's weights into `model`.
    pub fn load_model<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let epoch = self.latest_epoch()?;
        tracing::info!("Loading checkpoint from epoch {} in '{}'", epoch, self.dir.display());
        Self::load_record_file(&self.model_path(epoch), model, device)
    }

    /// Restore weights from an explicit record file (extension optional).
    pub fn load_record_file<B: Backend, M: Module<B>>(
        path:   &Path,
        model:  M,
        device: &B::Device,
    ) -> Result<M> {
        let record = <CompactRecorder as Recorder<B>>::load(
            &CompactRecorder::new(),
            path.with_extension(""),
            device,
        )
        .with_context(|| {
            format!("Cannot load checkpoint '{}'. Has the model been trained?", path.display())
        })?;
        Ok(model.load_record(record))
    }

    pub fn save_classifier_config(&self, cfg: &ClassifierConfig) -> Result<()> {
        self.save_burn_config(CLASSIFIER_CONFIG_FILE, cfg)
    }

    pub fn load_classifier_config(&self) -> Result<ClassifierConfig> {
        let path = self.dir.join(CLASSIFIER_CONFIG_FILE);
        let cfg = ClassifierConfig::load(&path).map_err(|err| {
            anyhow::anyhow!(
                "Cannot read '{}': {err:?}. Make sure a training run wrote this directory.",
                path.display(),
            )
        })?;
        cfg.validate()
            .with_context(|| format!("Invalid classifier config '{}'", path.display()))?;
        Ok(cfg)
    }

    pub fn save_teacher_config(&self, cfg: &ClassifierConfig) -> Result<()> {
        self.save_burn_config(TEACHER_CONFIG_FILE, cfg)
    }

    fn save_burn_config(&self, name: &str, cfg: &ClassifierConfig) -> Result<()> {
        let path = self.dir.join(name);
        cfg.save(&path)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved '{}'", path.display());
        Ok(())
    }

    /// Persist the settings a run was started with.
    pub fn save_run_config<T: Serialize>(&self, cfg: &T) -> Result<()> {
        let path = self.dir.join(RUN_CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write run config to '{}'", path.display()))?;
        Ok(())
    }

    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_EPOCH_FILE);
        let s = fs::read_to_string(&path).with_context(|| {
            format!("Cannot find '{}'. Has a training run finished an epoch?", path.display())
        })?;
        Ok(serde_json::from_str::<usize>(s.trim())?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::classifier::BertClassifier;
    use crate::ml::config::BertConfig;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn classifier_config() -> ClassifierConfig {
        let encoder = BertConfig::new(20)
            .with_hidden_size(8)
            .with_num_hidden_layers(1)
            .with_num_attention_heads(2)
            .with_intermediate_size(8)
            .with_max_position_embeddings(4);
        ClassifierConfig::new(encoder)
    }

    #[test]
    fn test_config_round_trip() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        ckpt.save_classifier_config(&classifier_config().with_label_size(5)).unwrap();

        let loaded = ckpt.load_classifier_config().unwrap();
        assert_eq!(loaded.label_size, 5);
        assert_eq!(loaded.encoder.hidden_size, 8);
    }

    #[test]
    fn test_weights_round_trip() {
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();
        let device = Default::default();

        let saved: BertClassifier<TestBackend> = classifier_config().init(&device);
        ckpt.save_model(&saved, 3).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 3);

        let fresh: BertClassifier<TestBackend> = classifier_config().init(&device);
        let loaded = ckpt.load_model(fresh, &device).unwrap();

        // CompactRecorder stores half precision
        let diff = (saved.cls.weight.val() - loaded.cls.weight.val())
            .abs()
            .max()
            .into_scalar();
        assert!(diff < 1e-2);
    }

    #[test]
    fn test_missing_epoch_file_is_an_error() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        assert!(ckpt.latest_epoch().is_err());
    }

    #[test]
    fn test_open_requires_existing_directory() {
        assert!(CheckpointManager::open("no/such/checkpoints").is_err());
    }
}
