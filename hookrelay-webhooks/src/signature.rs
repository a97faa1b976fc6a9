//! Webhook signature generation and verification

use crate::{EventDescriptor, Result, SignedDescriptor, WebhookError};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 signer bound to one shared secret
#[derive(Clone)]
pub struct WebhookSignature {
    secret: String,
}

impl std::fmt::Debug for WebhookSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSignature")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl WebhookSignature {
    /// Create a new signature utility with the given secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Sign the canonical serialization of a descriptor
    pub fn sign(&self, descriptor: &EventDescriptor) -> Result<String> {
        self.sign_bytes(&descriptor.canonical_bytes()?)
    }

    /// Sign a descriptor and freeze it
    pub fn seal(&self, descriptor: EventDescriptor) -> Result<SignedDescriptor> {
        let signature = self.sign(&descriptor)?;
        Ok(SignedDescriptor::new(descriptor, signature))
    }

    /// Lowercase hex HMAC-SHA256 over raw bytes
    pub fn sign_bytes(&self, payload: &[u8]) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Verify a signature against a descriptor.
    ///
    /// Never fails: a malformed signature, an empty secret or an encoding
    /// problem all count as "does not match".
    pub fn verify(&self, descriptor: &EventDescriptor, signature: &str) -> bool {
        match descriptor.canonical_bytes() {
            Ok(bytes) => self.verify_bytes(&bytes, signature),
            Err(_) => false,
        }
    }

    /// Verify a hex signature against raw bytes in constant time
    pub fn verify_bytes(&self, payload: &[u8], signature: &str) -> bool {
        let Ok(provided) = hex::decode(signature.trim()) else {
            return false;
        };
        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(payload);
        mac.verify_slice(&provided).is_ok()
    }

    /// Check a sealed descriptor against this secret
    pub fn verify_signed(&self, signed: &SignedDescriptor) -> bool {
        self.verify(signed.descriptor(), signed.signature())
    }

    fn mac(&self) -> Result<HmacSha256> {
        if self.secret.is_empty() {
            return Err(WebhookError::ConfigurationError(
                "signing secret must not be empty".to_string(),
            ));
        }
        HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| WebhookError::ConfigurationError(e.to_string()))
    }
}

/// Sign `descriptor` with `secret`
pub fn sign(descriptor: &EventDescriptor, secret: &str) -> Result<String> {
    WebhookSignature::new(secret).sign(descriptor)
}

/// Check `signature` for `descriptor` under `secret`
pub fn verify(descriptor: &EventDescriptor, signature: &str, secret: &str) -> bool {
    WebhookSignature::new(secret).verify(descriptor, signature)
}

/// Header names used on the wire
pub mod headers {
    /// Hex HMAC-SHA256 of the body
    pub const SIGNATURE: &str = "X-Webhook-Signature";

    /// Coarse authentication key
    pub const API_KEY: &str = "X-Api-Key";

    /// Event type (`created`, `updated`, ...)
    pub const EVENT_TYPE: &str = "X-Webhook-Event";

    /// Entity class of the event
    pub const ENTITY_CLASS: &str = "X-Webhook-Entity";

    /// Stable event id, identical across retries
    pub const WEBHOOK_ID: &str = "X-Webhook-Id";

    /// 1-based attempt number
    pub const ATTEMPT: &str = "X-Webhook-Attempt";
}
