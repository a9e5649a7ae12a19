// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses the command line with clap and routes each subcommand
// to its use case in Layer 2:
//
//   1. `train`    — trains the generator on *.jsonl turns
//   2. `generate` — realises one input act from a checkpoint
//   3. `inspect`  — lists a checkpoint's settings and parameters

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, GenerateArgs, InspectArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "ctx-seq2seq",
    version = "0.1.0",
    about = "Train a context-aware dual-encoder seq2seq generator, then generate sentences from dialogue acts."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// The CLI layer only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Generate(args) => run_generate(args),
            Commands::Inspect(args)  => run_inspect(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on turns in: {}", args.data_dir);

    let use_case = TrainUseCase::new(args.into());
    let history  = use_case.execute()?;

    if let Some(last) = history.last() {
        println!(
            "Training complete after {} epochs (val_loss={:.4}, token_acc={:.1}%). Checkpoint saved.",
            last.epoch, last.val_loss, last.token_acc * 100.0,
        );
    } else {
        println!("Training complete. No epochs were run.");
    }
    Ok(())
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    use crate::application::generate_use_case::GenerateUseCase;

    let use_case = GenerateUseCase::new(&args.checkpoint_dir)?;
    let reply    = use_case.reply(&args.context, &args.input)?;
    println!("{reply}");
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    use crate::application::inspect_use_case::InspectUseCase;

    let summary = InspectUseCase::new(&args.checkpoint_dir)?.summarize()?;

    println!("Checkpoint '{}' at epoch {}", args.checkpoint_dir, summary.epoch);
    println!("Settings: {}", serde_json::to_string_pretty(&summary.settings)?);
    for p in &summary.params {
        println!("{:<80} {:?}", p.name, p.shape);
    }
    println!("{} parameters, {} values", summary.params.len(), summary.total_values());
    Ok(())
}
