//! Undertow CLI - Command-line interface
//!
//! Starts the streaming delivery server or runs one-off resolutions
//! against the configured torrent indexes.

mod commands;

use clap::Parser;

#[derive(Parser)]
#[command(name = "undertow")]
#[command(about = "A torrent streaming resolution and delivery proxy")]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::handle_command(cli.command).await
}
