//! Error types for Relay CI.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Collaborator errors
    #[error("Task store error: {0}")]
    Store(String),

    #[error("Project configuration unavailable for version {version}: {reason}")]
    ProjectConfig { version: String, reason: String },

    #[error("Dispatcher error: {0}")]
    Dispatch(String),

    // Pass errors
    #[error("Failed to build {cache}: {reason}")]
    CacheConstruction { cache: &'static str, reason: String },

    #[error("{stage} timed out after {elapsed:?}")]
    Timeout { stage: &'static str, elapsed: Duration },

    // Startup errors
    #[error("Ranking rule registered twice: {0}")]
    DuplicateRule(String),

    #[error("Unknown ranking rule: {0}")]
    UnknownRule(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
