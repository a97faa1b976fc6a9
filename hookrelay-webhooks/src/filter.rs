//! Subscription filtering

use crate::{EventDescriptor, EventType, Result, WebhookError};
use hookrelay_config::{ConfigError, ConfigValidator, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A subscriber's declared interest: one entity class, a set of event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Optional label used in logs and normalized records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Exact entity class to match; no wildcards or hierarchy
    pub entity_class: String,

    /// Event types to match (non-empty)
    pub event_types: BTreeSet<EventType>,

    /// When true, a missing or mismatched signature rejects the request
    #[serde(
        default = "default_verify_signature",
        deserialize_with = "hookrelay_config::de::lenient"
    )]
    pub verify_signature: bool,
}

fn default_verify_signature() -> bool {
    true
}

impl Subscription {
    /// Create a subscription. Signature verification is on by default.
    pub fn new(
        entity_class: impl Into<String>,
        event_types: impl IntoIterator<Item = EventType>,
    ) -> Result<Self> {
        let subscription = Self {
            name: None,
            entity_class: entity_class.into(),
            event_types: event_types.into_iter().collect(),
            verify_signature: true,
        };
        subscription
            .validate()
            .map_err(|e| WebhookError::ConfigurationError(e.to_string()))?;
        Ok(subscription)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn verify_signature(mut self, verify: bool) -> Self {
        self.verify_signature = verify;
        self
    }

    /// Name if set, otherwise the entity class
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.entity_class)
    }

    /// Whether this subscription is interested in the descriptor
    pub fn matches(&self, descriptor: &EventDescriptor) -> bool {
        descriptor.entity_class() == self.entity_class
            && self.event_types.contains(&descriptor.event_type())
    }
}

impl Validate for Subscription {
    fn validate(&self) -> hookrelay_config::Result<()> {
        ConfigValidator::not_empty(&self.entity_class, "subscription.entity_class")?;
        if self.event_types.is_empty() {
            return Err(ConfigError::invalid(
                "subscription.event_types",
                format!("subscription `{}` selects no events", self.label()),
            ));
        }
        Ok(())
    }
}

/// True iff entity class and event type both match exactly
pub fn matches(descriptor: &EventDescriptor, subscription: &Subscription) -> bool {
    subscription.matches(descriptor)
}

/// Every subscription interested in the descriptor (fan-out, not first match)
pub fn matching<'a>(
    descriptor: &'a EventDescriptor,
    subscriptions: &'a [Subscription],
) -> impl Iterator<Item = &'a Subscription> + 'a {
    subscriptions.iter().filter(move |s| s.matches(descriptor))
}
