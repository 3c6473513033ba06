// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with clap.
// All work is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `train`   — trains a model and checkpoints it
//   2. `analyze` — evaluates the best checkpoint of a run
//   3. `run`     — both, analysing exactly what was trained
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, RunArgs};

use crate::application::{analyze_use_case::AnalyzeUseCase, train_use_case::TrainUseCase};
use crate::domain::config::NecstConfig;

#[derive(Parser, Debug)]
#[command(
    name = "necst",
    version = "0.1.0",
    about = "Train and analyse NECST models: neural compression of bit vectors over a noisy channel."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route to the matching use case. The CLI layer only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Analyze(args) => run_analyze(args),
            Commands::Run(args)     => run_both(args),
        }
    }
}

fn run_train(args: RunArgs) -> Result<()> {
    let cfg    = NecstConfig::try_from(args)?;
    let report = TrainUseCase::new(cfg).execute()?;
    match &report.outcome.best {
        Some(best) => println!(
            "Training complete. Best validation loss {:.4} at step {}: {}",
            best.valid_loss, best.step, best.path.display(),
        ),
        None => println!("Training complete. No finite validation loss was recorded."),
    }
    if report.outcome.skipped_steps > 0 {
        println!("{} steps skipped on a non-finite loss", report.outcome.skipped_steps);
    }
    println!("Outputs under {}", report.layout.outdir.display());
    Ok(())
}

fn run_analyze(args: RunArgs) -> Result<()> {
    let cfg    = NecstConfig::try_from(args)?;
    let report = AnalyzeUseCase::new(cfg).execute(None)?;
    print_analysis(&report);
    Ok(())
}

fn run_both(args: RunArgs) -> Result<()> {
    let cfg     = NecstConfig::try_from(args)?;
    let trained = TrainUseCase::new(cfg.clone()).execute()?;

    // --ckpt named the resume point; analysis follows the training outcome
    let analysis_cfg = NecstConfig { ckpt: None, ..cfg };
    let report = AnalyzeUseCase::new(analysis_cfg).execute(trained.outcome.best.as_ref())?;
    print_analysis(&report);
    Ok(())
}

fn print_analysis(report: &crate::application::analyze_use_case::AnalysisReport) {
    println!("\nCheckpoint: {}", report.checkpoint);
    println!(
        "Test loss {:.4} | reconstruction error {:.4} | channel bit error rate {:.4}",
        report.test.loss, report.test.reconstruction_error, report.test.bit_error_rate,
    );
    for path in &report.outputs {
        println!("  wrote {}", path.display());
    }
}
