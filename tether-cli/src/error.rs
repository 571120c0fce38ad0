//! Error types for the CLI.

use crate::config::ConfigError;
use tether_storage::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Client(#[from] GatewayError),
    #[error("Invalid argument: {0}")]
    Usage(String),
}
