// ============================================================
// Layer 5 — Encoder Configuration
// ============================================================
// Hyper-parameters of one transformer encoder. The same struct
// describes both the teacher and the student model; only the
// numbers differ (e.g. 12 layers / 768 hidden for the teacher,
// 4 layers / 312 hidden for the student).
//
// Field names follow the usual `bert_config.json` layout so an
// existing config file can be loaded as-is:
//
//   {
//     "vocab_size": 30522,
//     "hidden_size": 312,
//     "num_hidden_layers": 4,
//     "num_attention_heads": 12,
//     "intermediate_size": 1200,
//     ...
//   }
//
// Reference: Burn Book §3 (Config)
//            Devlin et al. (2019) BERT

use anyhow::{ensure, Context, Result};
use burn::prelude::*;
use std::path::Path;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct BertConfig {
    /// Number of distinct token ids
    pub vocab_size: usize,

    /// Width of every hidden state
    #[config(default = 768)]
    pub hidden_size: usize,

    #[config(default = 12)]
    pub num_hidden_layers: usize,

    /// Must divide `hidden_size`
    #[config(default = 12)]
    pub num_attention_heads: usize,

    /// Inner width of the feed-forward block
    #[config(default = 3072)]
    pub intermediate_size: usize,

    #[config(default = 0.1)]
    pub hidden_dropout_prob: f64,

    #[config(default = 0.1)]
    pub attention_probs_dropout_prob: f64,

    /// Longest sequence the position table can embed
    #[config(default = 512)]
    pub max_position_embeddings: usize,

    /// Number of segment ids (sentence A / sentence B)
    #[config(default = 2)]
    pub type_vocab_size: usize,

    /// Standard deviation of the normal weight initializer
    #[config(default = 0.02)]
    pub initializer_range: f64,

    #[config(default = 1e-12)]
    pub layer_norm_eps: f64,
}

impl BertConfig {
    /// Size of one attention head.
    pub fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads
    }

    /// Check the sizes are usable before any weights are allocated.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.vocab_size > 0, "vocab_size must be positive");
        ensure!(self.hidden_size > 0, "hidden_size must be positive");
        ensure!(self.num_hidden_layers > 0, "num_hidden_layers must be positive");
        ensure!(self.num_attention_heads > 0, "num_attention_heads must be positive");
        ensure!(
            self.hidden_size % self.num_attention_heads == 0,
            "hidden_size ({}) must be divisible by num_attention_heads ({})",
            self.hidden_size,
            self.num_attention_heads,
        );
        ensure!(self.intermediate_size > 0, "intermediate_size must be positive");
        ensure!(self.max_position_embeddings > 0, "max_position_embeddings must be positive");
        ensure!(self.type_vocab_size > 0, "type_vocab_size must be positive");
        ensure!(
            (0.0..1.0).contains(&self.hidden_dropout_prob)
                && (0.0..1.0).contains(&self.attention_probs_dropout_prob),
            "dropout probabilities must be in [0, 1)",
        );
        Ok(())
    }

    /// Copy of this config with dropout disabled.
    /// The teacher model always runs in evaluation mode.
    pub fn frozen(&self) -> Self {
        self.clone()
            .with_hidden_dropout_prob(0.0)
            .with_attention_probs_dropout_prob(0.0)
    }

    /// Read a `bert_config.json` style file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::load(path).map_err(|err| {
            anyhow::anyhow!("Cannot read encoder config '{}': {err:?}", path.display())
        })?;
        config
            .validate()
            .with_context(|| format!("Invalid encoder config '{}'", path.display()))?;
        tracing::debug!(
            "Loaded encoder config '{}': {} layers, hidden={}",
            path.display(),
            config.num_hidden_layers,
            config.hidden_size,
        );
        Ok(config)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_bert_base() {
        let cfg = BertConfig::new(30522);
        assert_eq!(cfg.hidden_size, 768);
        assert_eq!(cfg.num_hidden_layers, 12);
        assert_eq!(cfg.head_dim(), 64);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_heads_must_divide_hidden() {
        let cfg = BertConfig::new(100)
            .with_hidden_size(30)
            .with_num_attention_heads(4);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_frozen_disables_dropout_only() {
        let cfg = BertConfig::new(100).with_num_hidden_layers(6).frozen();
        assert_eq!(cfg.hidden_dropout_prob, 0.0);
        assert_eq!(cfg.attention_probs_dropout_prob, 0.0);
        assert_eq!(cfg.num_hidden_layers, 6);
    }

    #[test]
    fn test_file_round_trip() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("bert_config.json");
        let cfg  = BertConfig::new(1000).with_hidden_size(128).with_num_attention_heads(4);
        cfg.save(&path).unwrap();

        let loaded = BertConfig::from_file(&path).unwrap();
        assert_eq!(loaded.vocab_size, 1000);
        assert_eq!(loaded.hidden_size, 128);
        assert_eq!(loaded.num_attention_heads, 4);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(BertConfig::from_file("does/not/exist.json").is_err());
    }
}
