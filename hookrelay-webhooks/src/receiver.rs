//! Webhook receiver for handling incoming lifecycle events
//!
//! Each request walks `Received -> SignatureChecked -> Parsed -> Filtered`
//! and ends in exactly one of `Emitted`, `Dropped` or `Rejected` per
//! subscription. The outcome is returned synchronously so the transport can
//! pick its status code.

use crate::signature::headers;
use crate::{EventDescriptor, ReceiverConfig, Result, Subscription, WebhookError, WebhookSignature};
use chrono::{DateTime, Utc};
use hookrelay_config::Validate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

/// Log target for authentication failures
pub const SECURITY_TARGET: &str = "hookrelay::security";

/// Why a request was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Signature absent or mismatched while verification is required
    InvalidSignature,
    /// API-key header absent or wrong
    Unauthorized,
    /// Body is not a valid event descriptor
    MalformedPayload(String),
}

impl Rejection {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidSignature | Self::Unauthorized => 401,
            Self::MalformedPayload(_) => 400,
        }
    }

    /// Short machine-readable reason
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidSignature => "invalid_signature",
            Self::Unauthorized => "unauthorized",
            Self::MalformedPayload(_) => "malformed_payload",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedPayload(detail) => write!(f, "{}: {}", self.reason(), detail),
            _ => f.write_str(self.reason()),
        }
    }
}

impl From<Rejection> for WebhookError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::InvalidSignature | Rejection::Unauthorized => WebhookError::InvalidSignature,
            Rejection::MalformedPayload(detail) => WebhookError::MalformedPayload(detail),
        }
    }
}

/// What downstream consumers receive for a matched event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    /// Label of the subscription that matched
    pub subscription: String,
    pub event: EventDescriptor,
    /// Request headers, names lowercased, API key redacted
    pub headers: BTreeMap<String, String>,
    pub received_at: DateTime<Utc>,
}

/// Terminal state of one request for one subscription
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiveOutcome {
    Emitted(NormalizedRecord),
    /// Authentic and well-formed, but not of interest to this subscription
    Dropped,
    Rejected(Rejection),
}

impl ReceiveOutcome {
    /// HTTP status for the transport: 200 unless rejected
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Rejected(rejection) => rejection.status_code(),
            Self::Emitted(_) | Self::Dropped => 200,
        }
    }

    pub fn is_emitted(&self) -> bool {
        matches!(self, Self::Emitted(_))
    }

    pub fn record(&self) -> Option<&NormalizedRecord> {
        match self {
            Self::Emitted(record) => Some(record),
            _ => None,
        }
    }
}

/// Receiver for incoming webhooks
#[derive(Debug, Clone)]
pub struct WebhookReceiver {
    signature: Option<WebhookSignature>,
    api_key: Option<String>,
    subscriptions: Arc<[Subscription]>,
}

impl WebhookReceiver {
    /// Validate the configuration and build a receiver
    pub fn new(config: ReceiverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            signature: config.secret.map(WebhookSignature::new),
            api_key: config.api_key,
            subscriptions: config.subscriptions.into(),
        })
    }

    /// Configured subscriptions
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Evaluate one request against one subscription
    pub fn receive(
        &self,
        raw_body: &[u8],
        headers: &HashMap<String, String>,
        subscription: &Subscription,
    ) -> ReceiveOutcome {
        self.receive_all(raw_body, headers, std::slice::from_ref(subscription))
            .pop()
            .unwrap_or(ReceiveOutcome::Dropped)
    }

    /// Evaluate one request against the configured subscriptions
    pub fn receive_configured(
        &self,
        raw_body: &[u8],
        headers: &HashMap<String, String>,
    ) -> Vec<ReceiveOutcome> {
        self.receive_all(raw_body, headers, &self.subscriptions)
    }

    /// Evaluate one request against each subscription independently.
    ///
    /// The body is parsed at most once, and only if some subscription either
    /// does not require a signature or its signature check passed.
    pub fn receive_all(
        &self,
        raw_body: &[u8],
        headers: &HashMap<String, String>,
        subscriptions: &[Subscription],
    ) -> Vec<ReceiveOutcome> {
        let received_at = Utc::now();

        if let Err(rejection) = self.authenticate(headers) {
            return vec![ReceiveOutcome::Rejected(rejection); subscriptions.len()];
        }

        let signature_valid = subscriptions
            .iter()
            .any(|s| s.verify_signature)
            .then(|| self.check_signature(raw_body, headers));

        let mut parsed: Option<std::result::Result<EventDescriptor, Rejection>> = None;
        let mut outcomes = Vec::with_capacity(subscriptions.len());

        for subscription in subscriptions {
            if subscription.verify_signature && signature_valid != Some(true) {
                outcomes.push(ReceiveOutcome::Rejected(Rejection::InvalidSignature));
                continue;
            }

            let descriptor = parsed.get_or_insert_with(|| {
                EventDescriptor::from_slice(raw_body).map_err(|e| match e {
                    WebhookError::MalformedPayload(detail) => Rejection::MalformedPayload(detail),
                    other => Rejection::MalformedPayload(other.to_string()),
                })
            });

            let outcome = match descriptor {
                Err(rejection) => ReceiveOutcome::Rejected(rejection.clone()),
                Ok(descriptor) if subscription.matches(descriptor) => {
                    ReceiveOutcome::Emitted(NormalizedRecord {
                        subscription: subscription.label().to_string(),
                        event: descriptor.clone(),
                        headers: normalize_headers(headers),
                        received_at,
                    })
                }
                Ok(_) => ReceiveOutcome::Dropped,
            };

            debug!(
                subscription = subscription.label(),
                status = outcome.status_code(),
                emitted = outcome.is_emitted(),
                "webhook evaluated"
            );
            outcomes.push(outcome);
        }

        if let Some(Err(Rejection::MalformedPayload(detail))) = &parsed {
            warn!(error = %detail, "rejected malformed webhook payload");
        }

        outcomes
    }

    fn authenticate(&self, headers: &HashMap<String, String>) -> std::result::Result<(), Rejection> {
        let Some(expected) = &self.api_key else {
            return Ok(());
        };

        let authorized = header(headers, headers::API_KEY)
            .is_some_and(|provided| constant_time_eq(provided.as_bytes(), expected.as_bytes()));
        if authorized {
            Ok(())
        } else {
            warn!(target: SECURITY_TARGET, "rejected webhook: missing or invalid API key");
            Err(Rejection::Unauthorized)
        }
    }

    fn check_signature(&self, raw_body: &[u8], headers: &HashMap<String, String>) -> bool {
        let Some(signer) = &self.signature else {
            warn!(
                target: SECURITY_TARGET,
                "rejected webhook: signature required but no secret configured"
            );
            return false;
        };
        let Some(provided) = header(headers, headers::SIGNATURE) else {
            warn!(target: SECURITY_TARGET, "rejected webhook: signature header missing");
            return false;
        };

        let valid = signer.verify_bytes(raw_body, provided);
        if !valid {
            warn!(
                target: SECURITY_TARGET,
                event_id = header(headers, headers::WEBHOOK_ID).unwrap_or("-"),
                body_len = raw_body.len(),
                "rejected webhook: signature mismatch"
            );
        }
        valid
    }
}

/// Case-insensitive header lookup
fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn normalize_headers(headers: &HashMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let name = name.to_ascii_lowercase();
            let value = if name.eq_ignore_ascii_case(headers::API_KEY) {
                "<redacted>".to_string()
            } else {
                value.clone()
            };
            (name, value)
        })
        .collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    (a.len().ct_eq(&b.len()) & a.ct_eq(b)).into()
}
