//! factlearn CLI — turn command output into facts and relationships.
//!
//! Drives the knowledge extraction core against JSON snapshots of abilities
//! and operations.

mod commands;

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
