//! Error types for webhook operations

use thiserror::Error;

/// Errors that can occur while capturing, delivering or receiving events
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Missing or invalid secret, API key or endpoint. Never retried.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A single attempt failed in a way that may succeed later
    /// (network error, timeout, 5xx, 429)
    #[error("Transient delivery error: {0}")]
    TransientDelivery(String),

    /// The consumer answered with a non-retryable 4xx
    #[error("Delivery rejected with HTTP {status} after {attempts} attempt(s)")]
    RejectedDelivery {
        status: u16,
        attempts: u32,
        body: Option<String>,
    },

    /// Delivery failed after all retries
    #[error("Delivery failed after {attempts} attempts: {message}")]
    DeliveryFailed { attempts: u32, message: String },

    /// Signature absent or mismatched on an inbound request
    #[error("Signature verification failed")]
    InvalidSignature,

    /// Inbound body could not be decoded into an event descriptor
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Canonical body larger than the configured limit
    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// HTTP client construction or transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Socket level failure in the receiver endpoint
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WebhookError {
    /// Whether the delivery loop may try again after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::TransientDelivery(_))
    }

    /// Number of HTTP attempts made before the error surfaced, if any
    pub fn attempts(&self) -> Option<u32> {
        match self {
            WebhookError::RejectedDelivery { attempts, .. }
            | WebhookError::DeliveryFailed { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::MalformedPayload(err.to_string())
    }
}

impl From<hookrelay_config::ConfigError> for WebhookError {
    fn from(err: hookrelay_config::ConfigError) -> Self {
        WebhookError::ConfigurationError(err.to_string())
    }
}
