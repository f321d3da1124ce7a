// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands off to Layer 2.
//
//   finetune — train a classifier to serve as the teacher
//   distill  — train a student against that teacher
//   predict  — print one JSON prediction per input line
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, DistillArgs, FinetuneArgs, PredictArgs};

#[derive(Parser, Debug)]
#[command(
    name = "tinybert-distill",
    version,
    about = "Fine-tune a BERT classifier, then distill it into a smaller TinyBERT student."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand to its use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Finetune(args) => run_finetune(args),
            Commands::Distill(args)  => run_distill(args),
            Commands::Predict(args)  => run_predict(args),
        }
    }
}

fn run_finetune(args: FinetuneArgs) -> Result<()> {
    use crate::application::finetune_use_case::FinetuneUseCase;

    tracing::info!("Fine-tuning on samples in: {}", args.training.data);
    let checkpoint_dir = args.training.checkpoint_dir.clone();
    FinetuneUseCase::new(args.into()).execute()?;

    println!("Fine-tuning complete. Checkpoints saved to '{checkpoint_dir}'.");
    Ok(())
}

fn run_distill(args: DistillArgs) -> Result<()> {
    use crate::application::distill_use_case::DistillUseCase;

    tracing::info!("Distilling on samples in: {}", args.training.data);
    let checkpoint_dir = args.training.checkpoint_dir.clone();
    DistillUseCase::new(args.into()).execute()?;

    println!("Distillation complete. Student saved to '{checkpoint_dir}'.");
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let records = PredictUseCase::new(args.into()).execute()?;
    for record in &records {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_distill_args_with_teacher_dir() {
        let cli = Cli::try_parse_from([
            "tinybert-distill", "distill",
            "--student-config", "student.json",
            "--teacher-dir", "teacher",
            "--epochs", "5",
            "--cpu",
        ])
        .unwrap();

        let Commands::Distill(args) = cli.command else { panic!("expected distill") };
        assert_eq!(args.teacher_dir.as_deref(), Some("teacher"));
        assert_eq!(args.training.epochs, 5);
        assert!(args.training.cpu);
        assert_eq!(args.training.max_seq_len, 128);
    }

    #[test]
    fn test_distill_needs_exactly_one_teacher() {
        let base = ["tinybert-distill", "distill", "--student-config", "s.json"];
        assert!(Cli::try_parse_from(base).is_err());

        let mut both = base.to_vec();
        both.extend(["--teacher-dir", "t", "--teacher-config", "t.json"]);
        assert!(Cli::try_parse_from(both).is_err());
    }

    #[test]
    fn test_teacher_checkpoint_requires_teacher_dir() {
        let result = Cli::try_parse_from([
            "tinybert-distill", "distill",
            "--student-config", "s.json",
            "--teacher-config", "t.json",
            "--teacher-checkpoint", "t/model_epoch_3",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_finetune_args_convert_to_config() {
        use crate::application::finetune_use_case::FinetuneConfig;

        let cli = Cli::try_parse_from([
            "tinybert-distill", "finetune",
            "--bert-config", "bert.json",
            "--label-size", "4",
            "--lr", "0.001",
        ])
        .unwrap();
        let Commands::Finetune(args) = cli.command else { panic!("expected finetune") };
        let cfg: FinetuneConfig = args.into();
        assert_eq!(cfg.label_size, 4);
        assert_eq!(cfg.settings.lr, 0.001);
        assert_eq!(cfg.settings.seed, 42);
    }
}
