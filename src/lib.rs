// hookrelay - signed lifecycle-event webhooks
//
// Emits entity lifecycle events as signed HTTP callbacks and receives them
// back as verified, subscription-filtered records.

// Re-export the webhook core
pub use hookrelay_webhooks::*;

// Re-export member crates
pub use hookrelay_config;
pub use hookrelay_webhooks;

pub mod logging;

pub mod prelude {
    pub use crate::{
        DeliveryClient, DeliveryReceipt, EmitterConfig, Entity, EntitySnapshot, EventDescriptor,
        EventSource, EventType, HookRegistry, LifecycleHooks, ReceiveOutcome, ReceiverConfig,
        Settings, Subscription, WebhookError, WebhookReceiver, WebhookSignature,
    };
    pub use hookrelay_config::Validate;
}
