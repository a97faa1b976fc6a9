//! Tracing subscriber setup for the `hookrelay` binary.
//!
//! `RUST_LOG` wins over the configured level when set. Authentication
//! failures are logged under the `hookrelay::security` target, so they can be
//! routed separately:
//!
//! ```text
//! RUST_LOG=info,hookrelay::security=warn hookrelay receive --config hooks.toml
//! ```

use std::io;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, ANSI colours when attached to a terminal
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            targets: true,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn targets(mut self, enabled: bool) -> Self {
        self.targets = enabled;
        self
    }

    /// Filter from `RUST_LOG`, falling back to the configured level
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }

    /// Install the global subscriber. Logs go to stderr so stdout stays free
    /// for records and signatures.
    pub fn init(self) -> Result<(), tracing_subscriber::util::TryInitError> {
        let env_filter = self.env_filter();

        match self.format {
            LogFormat::Json => {
                let layer = fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_target(self.targets)
                    .with_current_span(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(layer)
                    .try_init()
            }
            LogFormat::Pretty => {
                let layer = fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(self.targets);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(layer)
                    .try_init()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = LogConfig::new()
            .level("debug")
            .format(LogFormat::Json)
            .targets(false);
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.targets);
    }
}
