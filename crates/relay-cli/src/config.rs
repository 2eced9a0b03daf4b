//! CLI configuration.

use relay_scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Load the scheduler configuration, falling back to the defaults when no
/// file is given.
pub fn load_scheduler_config(path: Option<&Path>) -> anyhow::Result<SchedulerConfig> {
    match path {
        Some(path) => Ok(SchedulerConfig::from_file(path)?),
        None => Ok(SchedulerConfig::default()),
    }
}
