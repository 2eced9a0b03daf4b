//! Relay CI dispatch ranking CLI.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod handlers;

use commands::Commands;

#[derive(Parser)]
#[command(name = "relay")]
#[command(author, version, about = "Relay CI task dispatch ranking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rank {
            snapshot,
            distro,
            config,
            format,
        } => handlers::rank(&snapshot, distro, config.as_deref(), format).await?,
        Commands::Rules { config } => handlers::rules(config.as_deref())?,
    }

    Ok(())
}
