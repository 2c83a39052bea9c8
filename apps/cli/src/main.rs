//! CybVector CLI: cybersecurity assistant served over HTTP or the terminal.
//!
//! Runs the hygiene quiz, threat-intel lookups, and general security chat
//! behind one per-session dialogue controller.

mod commands;
mod server;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
