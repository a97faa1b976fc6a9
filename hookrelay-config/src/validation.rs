// Configuration validation

use crate::{ConfigError, Result};
use std::fmt::Display;

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Configuration validator with rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty (after trimming)
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::invalid(field, "cannot be empty"));
        }
        Ok(())
    }

    /// Validate an optional value: absent is fine, present-but-empty is not
    pub fn not_blank_if_set(value: Option<&str>, field: &str) -> Result<()> {
        match value {
            Some(v) => Self::not_empty(v, field),
            None => Ok(()),
        }
    }

    /// Validate that a number is within range
    pub fn in_range<T: PartialOrd + Display>(value: T, min: T, max: T, field: &str) -> Result<()> {
        if value < min || value > max {
            return Err(ConfigError::invalid(
                field,
                format!("must be between {} and {}, got {}", min, max, value),
            ));
        }
        Ok(())
    }

    /// Validate an absolute http(s) URL
    pub fn is_url(value: &str, field: &str) -> Result<()> {
        let parsed = url::Url::parse(value).map_err(|e| ConfigError::invalid(field, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(field, "must use http or https"));
        }
        Ok(())
    }

    /// Validate a URL path (must start with `/`)
    pub fn is_path(value: &str, field: &str) -> Result<()> {
        if !value.starts_with('/') {
            return Err(ConfigError::invalid(field, "must start with '/'"));
        }
        Ok(())
    }
}
