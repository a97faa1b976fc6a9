//! Event descriptors: the unit of transport for one lifecycle change

use crate::{Result, WebhookError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Field name to value. Ordered so the canonical serialization is stable.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Lifecycle transitions an entity can go through
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Created,
    Updated,
    Deleted,
    Restored,
    Saving,
    Saved,
}

impl EventType {
    /// Every member, in declaration order
    pub const ALL: [EventType; 6] = [
        EventType::Created,
        EventType::Updated,
        EventType::Deleted,
        EventType::Restored,
        EventType::Saving,
        EventType::Saved,
    ];

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Restored => "restored",
            Self::Saving => "saving",
            Self::Saved => "saved",
        }
    }

    /// Whether descriptors of this type may carry `previousAttributes`
    pub fn carries_previous(&self) -> bool {
        matches!(self, Self::Updated | Self::Saving | Self::Saved)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = WebhookError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| WebhookError::MalformedPayload(format!("unknown event type `{}`", s)))
    }
}

/// One lifecycle change of one entity.
///
/// Field declaration order is the canonical order used for signing:
/// `entityClass`, `eventType`, `attributes`, `previousAttributes`,
/// `occurredAt`, `eventId`. Reordering these fields changes every signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDescriptor {
    entity_class: String,
    event_type: EventType,
    #[serde(default)]
    attributes: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_attributes: Option<Attributes>,
    #[serde(default = "Utc::now")]
    occurred_at: DateTime<Utc>,
    /// Stable identity of the logical event; identical across retries
    #[serde(default = "Uuid::new_v4")]
    event_id: Uuid,
}

impl EventDescriptor {
    /// Create a descriptor stamped with the current time and a fresh event id
    pub fn new(entity_class: impl Into<String>, event_type: EventType) -> Result<Self> {
        let entity_class = entity_class.into();
        if entity_class.trim().is_empty() {
            return Err(WebhookError::MalformedPayload(
                "entityClass must not be empty".to_string(),
            ));
        }

        Ok(Self {
            entity_class,
            event_type,
            attributes: Attributes::new(),
            previous_attributes: None,
            occurred_at: Utc::now(),
            event_id: Uuid::new_v4(),
        })
    }

    /// Replace the current attribute values
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set a single current attribute value
    pub fn with_attribute(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Set prior values. Ignored for event types that do not carry them,
    /// and an empty map means "nothing changed" and is stored as absent.
    pub fn with_previous_attributes(mut self, previous: Attributes) -> Self {
        self.previous_attributes =
            (self.event_type.carries_previous() && !previous.is_empty()).then_some(previous);
        self
    }

    /// Override the capture timestamp
    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// Override the event id
    pub fn with_event_id(mut self, event_id: Uuid) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn entity_class(&self) -> &str {
        &self.entity_class
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn previous_attributes(&self) -> Option<&Attributes> {
        self.previous_attributes.as_ref()
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// Deterministic byte encoding used both as signing input and as the
    /// outbound HTTP body.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode an inbound body. Missing `entityClass`/`eventType`, an unknown
    /// event type or non-JSON input are all `MalformedPayload`. Prior values
    /// are dropped unless the event type carries them and they are non-empty.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let mut descriptor: Self = serde_json::from_slice(bytes)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        if descriptor.entity_class.trim().is_empty() {
            return Err(WebhookError::MalformedPayload(
                "entityClass must not be empty".to_string(),
            ));
        }

        if let Some(previous) = descriptor.previous_attributes.take() {
            descriptor = descriptor.with_previous_attributes(previous);
        }

        Ok(descriptor)
    }
}

/// A descriptor together with its signature.
///
/// Only the signer can build one, and the descriptor is exposed read-only:
/// changing any field means calling [`SignedDescriptor::into_unsigned`] and
/// signing again.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedDescriptor {
    descriptor: EventDescriptor,
    signature: String,
}

impl SignedDescriptor {
    pub(crate) fn new(descriptor: EventDescriptor, signature: String) -> Self {
        Self {
            descriptor,
            signature,
        }
    }

    pub fn descriptor(&self) -> &EventDescriptor {
        &self.descriptor
    }

    /// Lowercase hex HMAC-SHA256 of the canonical bytes
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Drop the signature to get a mutable descriptor back
    pub fn into_unsigned(self) -> EventDescriptor {
        self.descriptor
    }
}
