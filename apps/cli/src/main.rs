//! feedherald CLI: announces feed releases to Discord with role mentions.
//!
//! `run` starts the bot; the other subcommands inspect and maintain its
//! ledger offline.

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
