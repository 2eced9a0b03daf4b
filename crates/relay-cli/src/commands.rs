//! CLI command definitions.

use crate::config::OutputFormat;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Rank the queued tasks of a snapshot file
    Rank {
        /// Path to a JSON task snapshot
        snapshot: PathBuf,

        /// Only rank this distro (default: every distro in the snapshot)
        #[arg(short, long)]
        distro: Option<String>,

        /// Scheduler configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// List ranking rules in chain order
    Rules {
        /// Scheduler configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
