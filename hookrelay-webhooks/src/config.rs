//! Emitter and receiver configuration
//!
//! Both sides are plain structs with serde defaults and builders. They are
//! validated once, when a [`DeliveryClient`](crate::DeliveryClient) or
//! [`WebhookReceiver`](crate::WebhookReceiver) is built, instead of at each
//! call site.

use crate::{EventType, RetryPolicy, Subscription};
use hookrelay_config::{ConfigError, ConfigManager, ConfigValidator, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Fixed path appended to the consumer's base URL, and served by the receiver
pub const DEFAULT_WEBHOOK_PATH: &str = "/webhooks/lifecycle";

/// Default maximum body size (1 MiB)
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Outbound side: where and how events are delivered
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Base URL of the automation consumer, e.g. `https://n8n.example.com`
    pub base_url: String,

    /// Path appended to `base_url`
    pub path: String,

    /// Sent in the API-key header on every request. Required.
    pub api_key: String,

    /// Shared HMAC secret. When absent no signature header is sent.
    pub secret: Option<String>,

    /// Per-attempt timeout, in milliseconds
    #[serde(with = "crate::retry::millis")]
    pub timeout: Duration,

    /// Retry schedule for transient failures
    pub retry: RetryPolicy,

    /// User-Agent header for outgoing requests
    pub user_agent: String,

    /// Canonical bodies larger than this are refused without sending
    #[serde(deserialize_with = "hookrelay_config::de::lenient")]
    pub max_payload_size: usize,

    /// Lifecycle events forwarded by the event source
    pub events: BTreeSet<EventType>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            path: DEFAULT_WEBHOOK_PATH.to_string(),
            api_key: String::new(),
            secret: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            user_agent: format!("hookrelay/{}", env!("CARGO_PKG_VERSION")),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            events: EventType::ALL.into_iter().collect(),
        }
    }
}

impl std::fmt::Debug for EmitterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmitterConfig")
            .field("base_url", &self.base_url)
            .field("path", &self.path)
            .field("api_key", &"<redacted>")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("user_agent", &self.user_agent)
            .field("max_payload_size", &self.max_payload_size)
            .field("events", &self.events)
            .finish()
    }
}

impl EmitterConfig {
    /// Create a builder for custom configuration
    pub fn builder(base_url: impl Into<String>, api_key: impl Into<String>) -> EmitterConfigBuilder {
        EmitterConfigBuilder::new(base_url, api_key)
    }

    /// Full delivery URL: base URL plus the fixed path
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.path)
    }
}

impl Validate for EmitterConfig {
    fn validate(&self) -> hookrelay_config::Result<()> {
        ConfigValidator::is_url(&self.base_url, "emitter.base_url")?;
        ConfigValidator::is_path(&self.path, "emitter.path")?;
        ConfigValidator::is_url(&self.endpoint(), "emitter.path")?;
        ConfigValidator::not_empty(&self.api_key, "emitter.api_key")?;
        ConfigValidator::not_blank_if_set(self.secret.as_deref(), "emitter.secret")?;
        ConfigValidator::in_range(self.retry.max_attempts, 1, 100, "emitter.retry.max_attempts")?;
        if self.retry.backoff_multiplier < 1.0 || !self.retry.backoff_multiplier.is_finite() {
            return Err(ConfigError::invalid(
                "emitter.retry.backoff_multiplier",
                "must be a finite number >= 1.0",
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::invalid("emitter.timeout", "must be positive"));
        }
        if self.max_payload_size == 0 {
            return Err(ConfigError::invalid("emitter.max_payload_size", "must be positive"));
        }
        if self.events.is_empty() {
            return Err(ConfigError::invalid("emitter.events", "select at least one event"));
        }
        Ok(())
    }
}

/// Builder for EmitterConfig
#[derive(Debug, Clone)]
pub struct EmitterConfigBuilder {
    config: EmitterConfig,
}

impl EmitterConfigBuilder {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            config: EmitterConfig {
                base_url: base_url.into(),
                api_key: api_key.into(),
                ..Default::default()
            },
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.config.secret = Some(secret.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Disable retries
    pub fn no_retries(mut self) -> Self {
        self.config.retry = RetryPolicy::none();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.config.max_payload_size = size;
        self
    }

    pub fn events(mut self, events: impl IntoIterator<Item = EventType>) -> Self {
        self.config.events = events.into_iter().collect();
        self
    }

    pub fn build(self) -> EmitterConfig {
        self.config
    }
}

/// Inbound side: the webhook endpoint and its subscriptions
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Listen address of the HTTP endpoint
    pub bind: SocketAddr,

    /// Path the webhook is accepted on
    pub path: String,

    /// Expected API-key header value. When absent the header is not checked.
    pub api_key: Option<String>,

    /// Shared HMAC secret. Required if any subscription verifies signatures.
    pub secret: Option<String>,

    /// Larger request bodies are refused by the HTTP layer
    #[serde(deserialize_with = "hookrelay_config::de::lenient")]
    pub max_payload_size: usize,

    /// Every subscription is evaluated independently against each event
    pub subscriptions: Vec<Subscription>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            path: DEFAULT_WEBHOOK_PATH.to_string(),
            api_key: None,
            secret: None,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            subscriptions: Vec::new(),
        }
    }
}

impl std::fmt::Debug for ReceiverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiverConfig")
            .field("bind", &self.bind)
            .field("path", &self.path)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("max_payload_size", &self.max_payload_size)
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}

impl ReceiverConfig {
    pub fn builder() -> ReceiverConfigBuilder {
        ReceiverConfigBuilder::default()
    }
}

impl Validate for ReceiverConfig {
    fn validate(&self) -> hookrelay_config::Result<()> {
        ConfigValidator::is_path(&self.path, "receiver.path")?;
        ConfigValidator::not_blank_if_set(self.api_key.as_deref(), "receiver.api_key")?;
        ConfigValidator::not_blank_if_set(self.secret.as_deref(), "receiver.secret")?;
        if self.max_payload_size == 0 {
            return Err(ConfigError::invalid("receiver.max_payload_size", "must be positive"));
        }

        for subscription in &self.subscriptions {
            subscription.validate()?;
            if subscription.verify_signature && self.secret.is_none() {
                return Err(ConfigError::invalid(
                    "receiver.secret",
                    format!(
                        "required because subscription `{}` verifies signatures",
                        subscription.label()
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Builder for ReceiverConfig
#[derive(Debug, Clone, Default)]
pub struct ReceiverConfigBuilder {
    config: ReceiverConfig,
}

impl ReceiverConfigBuilder {
    pub fn bind(mut self, bind: SocketAddr) -> Self {
        self.config.bind = bind;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = Some(api_key.into());
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.config.secret = Some(secret.into());
        self
    }

    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.config.max_payload_size = size;
        self
    }

    pub fn subscription(mut self, subscription: Subscription) -> Self {
        self.config.subscriptions.push(subscription);
        self
    }

    pub fn build(self) -> ReceiverConfig {
        self.config
    }
}

/// Top-level settings file: `[emitter]` and/or `[receiver]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub emitter: Option<EmitterConfig>,
    pub receiver: Option<ReceiverConfig>,
}

impl Settings {
    /// Load from an optional file, then `.env`, then `HOOKRELAY_*` variables
    pub fn load(path: Option<&Path>) -> hookrelay_config::Result<Self> {
        let mut manager = ConfigManager::with_prefix(hookrelay_config::DEFAULT_ENV_PREFIX);
        if let Some(path) = path {
            manager.load_file(path)?;
        }
        manager.load_dotenv(None)?;
        manager.load_validated()
    }
}

impl Validate for Settings {
    fn validate(&self) -> hookrelay_config::Result<()> {
        if let Some(emitter) = &self.emitter {
            emitter.validate()?;
        }
        if let Some(receiver) = &self.receiver {
            receiver.validate()?;
        }
        Ok(())
    }
}
