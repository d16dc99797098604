//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for the chatsync conversation engine.
#[derive(Parser)]
#[command(name = "chatsync")]
#[command(about = "Replay and inspect buyer/seller chat sync sessions")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
