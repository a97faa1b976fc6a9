// Error types for configuration loading

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration key not found: {0}")]
    KeyNotFound(String),

    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConfigError {
    /// Shorthand for a validation failure on a named field
    pub fn invalid(field: &str, reason: impl std::fmt::Display) -> Self {
        ConfigError::ValidationError(format!("{}: {}", field, reason))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
