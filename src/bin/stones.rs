//! Stones CLI - Train a 21-stones policy and play it on a device
//!
//! This CLI provides a unified interface for:
//! - Training a Q-table against a simulated opponent
//! - Exporting the table as upload lines, JSON or text
//! - Inspecting what the table would play
//! - Playing games over a serial link or a simulated device

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "stones")]
#[command(version, about = "Train and deploy a 21-stones policy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a policy table
    Train(Box<stones::cli::commands::train::TrainArgs>),

    /// Export a trained table
    Export(stones::cli::commands::export::ExportArgs),

    /// Show per-state scores and the greedy move
    Inspect(stones::cli::commands::inspect::InspectArgs),

    /// Play against a trained table
    Play(stones::cli::commands::play::PlayArgs),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Train(args) => stones::cli::commands::train::execute(*args),
        Commands::Export(args) => stones::cli::commands::export::execute(args),
        Commands::Inspect(args) => stones::cli::commands::inspect::execute(args),
        Commands::Play(args) => stones::cli::commands::play::execute(args),
    }
}
