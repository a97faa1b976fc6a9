//! Signed lifecycle-event webhooks
//!
//! This crate turns persistence lifecycle events (create, update, delete and
//! friends) into signed HTTP callbacks, and turns those callbacks back into
//! verified, filtered records on the receiving side.
//!
//! # Features
//!
//! - **Event Capture**: Snapshot an entity's attributes and prior values at hook time
//! - **Signature Verification**: HMAC-SHA256 over the canonical body, compared in constant time
//! - **Automatic Retries**: Exponential backoff with jitter, honouring `Retry-After`
//! - **Subscription Filtering**: Exact match on entity class and event type, with fan-out
//! - **Receiver**: Pure state machine plus an axum endpoint
//!
//! # Example: Sending Events
//!
//! ```rust,no_run
//! use hookrelay_webhooks::{DeliveryClient, EmitterConfig, EventDescriptor, EventType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EmitterConfig::builder("https://hooks.example.com", "api-key")
//!         .secret("shared-secret")
//!         .build();
//!     let client = DeliveryClient::new(config)?;
//!
//!     let event = EventDescriptor::new("Order", EventType::Created)?
//!         .with_attribute("status", serde_json::json!("pending"));
//!
//!     let receipt = client.deliver_configured(&event).await?;
//!     println!("delivered after {} attempt(s)", receipt.attempts);
//!     Ok(())
//! }
//! ```
//!
//! # Example: Receiving Events
//!
//! ```rust,no_run
//! use hookrelay_webhooks::{EventType, ReceiverConfig, Subscription, WebhookReceiver};
//! use std::collections::HashMap;
//!
//! # fn main() -> hookrelay_webhooks::Result<()> {
//! let config = ReceiverConfig::builder()
//!     .secret("shared-secret")
//!     .subscription(Subscription::new("Order", [EventType::Updated])?)
//!     .build();
//! let receiver = WebhookReceiver::new(config)?;
//!
//! let body = br#"{"entityClass":"Order","eventType":"updated"}"#;
//! let headers = HashMap::from([("X-Webhook-Signature".to_string(), "...".to_string())]);
//!
//! for outcome in receiver.receive_configured(body, &headers) {
//!     println!("{}", outcome.status_code());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example: Lifecycle Hooks
//!
//! ```rust,no_run
//! use hookrelay_webhooks::{
//!     DeliveryClient, EmitterConfig, EntitySnapshot, EventSource, EventType, LifecycleHooks,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EmitterConfig::builder("https://hooks.example.com", "api-key").build();
//!     let source = EventSource::new(DeliveryClient::new(config)?)?;
//!
//!     let mut hooks = LifecycleHooks::new();
//!     source.attach(&mut hooks, "Order");
//!
//!     let order = EntitySnapshot::new("Order", Default::default());
//!     hooks.fire(&order, EventType::Created);
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod event;
mod filter;
mod hooks;
mod receiver;
mod retry;
mod server;
mod signature;
mod source;
mod transport;

pub use client::{DeliveryClient, DeliveryReceipt, MAX_RESPONSE_BODY};
pub use config::{
    DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_WEBHOOK_PATH, EmitterConfig, EmitterConfigBuilder,
    ReceiverConfig, ReceiverConfigBuilder, Settings,
};
pub use error::WebhookError;
pub use event::{Attributes, EventDescriptor, EventType, SignedDescriptor};
pub use filter::{Subscription, matches, matching};
pub use hooks::{Entity, EntitySnapshot, HookRegistry, LifecycleHook, LifecycleHooks};
pub use receiver::{NormalizedRecord, ReceiveOutcome, Rejection, SECURITY_TARGET, WebhookReceiver};
pub use retry::{RetryPolicy, StatusClass};
pub use server::{ChannelSink, ReceiveSummary, RecordSink, router, serve, serve_listener};
pub use signature::{WebhookSignature, headers, sign, verify};
pub use source::{EventSource, capture};
pub use transport::{
    HttpTransport, MAX_RESPONSE_READ, OutboundRequest, Transport, TransportError,
    TransportResponse, parse_retry_after,
};

/// Result type for webhook operations
pub type Result<T> = std::result::Result<T, WebhookError>;
