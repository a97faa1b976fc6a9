//! Error types for the hookrelay CLI.

use hookrelay::WebhookError;
use hookrelay::hookrelay_config::ConfigError;
use thiserror::Error;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Webhook(#[from] WebhookError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file lacks the section a command needs
    #[error("Configuration error: no [{0}] section found")]
    MissingSection(&'static str),

    #[error("Logging error: {0}")]
    Logging(String),
}
