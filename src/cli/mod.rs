// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All real work is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`     — trains a model, keeps the best checkpoint
//   2. `inference` — loads that checkpoint and writes a CSV

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InferenceArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "dkt-trainer",
    version = "0.1.0",
    about = "Train knowledge-tracing sequence models, then predict student correctness."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Inference(args) => run_inference(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on '{}' with model '{}'", args.train_file, args.model);

    let model_dir = args.model_dir.clone();
    let report = TrainUseCase::new(args.into()).execute()?;

    match report.best.best_epoch {
        Some(epoch) => println!(
            "Training {}. Best valid AUC {:.4} (acc {:.4}) at epoch {}; checkpoint in '{}'.",
            report.phase,
            report.best.auc,
            report.best.acc,
            epoch + 1,
            model_dir
        ),
        None => println!("Training {}. No epoch produced a checkpoint.", report.phase),
    }
    Ok(())
}

fn run_inference(args: InferenceArgs) -> Result<()> {
    use crate::application::inference_use_case::InferenceUseCase;

    let use_case = InferenceUseCase::new(&args.model_dir, (&args).into());
    let (path, rows) = use_case.execute()?;

    println!("Wrote {} predictions to '{}'", rows, path.display());
    Ok(())
}
