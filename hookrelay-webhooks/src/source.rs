//! Event source: turns host lifecycle notifications into deliveries

use crate::{
    Attributes, DeliveryClient, DeliveryReceipt, Entity, EventDescriptor, EventType, HookRegistry,
    HttpTransport, LifecycleHook, Result, Transport, WebhookError,
};
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Build a descriptor for one lifecycle event of an entity.
///
/// For `updated`, `saving` and `saved`, `previousAttributes` holds the prior
/// value of every field that changed (a field that did not exist before has
/// prior value `null`). When nothing changed, or the host does not track
/// originals, it is absent.
pub fn capture(entity: &dyn Entity, event_type: EventType) -> Result<EventDescriptor> {
    let attributes = entity.attributes();
    let previous = match (event_type.carries_previous(), entity.original_attributes()) {
        (true, Some(original)) => changed_values(&attributes, &original),
        _ => Attributes::new(),
    };

    Ok(EventDescriptor::new(entity.entity_class(), event_type)?
        .with_attributes(attributes)
        .with_previous_attributes(previous))
}

/// Prior values of every key whose value differs between the two snapshots
fn changed_values(current: &Attributes, original: &Attributes) -> Attributes {
    let mut changed: Attributes = original
        .iter()
        .filter(|(key, value)| current.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    for key in current.keys() {
        if !original.contains_key(key) {
            changed.insert(key.clone(), serde_json::Value::Null);
        }
    }
    changed
}

/// Forwards lifecycle events of attached entity classes to the consumer.
///
/// Hooks fire on whatever thread the host uses. The descriptor is captured
/// synchronously; the network call runs on the Tokio runtime captured at
/// construction, so the host's mutation path never waits on delivery.
pub struct EventSource<T: Transport = HttpTransport> {
    client: DeliveryClient<T>,
    runtime: Handle,
}

impl<T: Transport> Clone for EventSource<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            runtime: self.runtime.clone(),
        }
    }
}

impl<T: Transport + 'static> EventSource<T> {
    /// Use the current Tokio runtime for background deliveries
    pub fn new(client: DeliveryClient<T>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            WebhookError::ConfigurationError(format!("event source needs a Tokio runtime: {}", e))
        })?;
        Ok(Self::with_handle(client, runtime))
    }

    pub fn with_handle(client: DeliveryClient<T>, runtime: Handle) -> Self {
        Self { client, runtime }
    }

    pub fn client(&self) -> &DeliveryClient<T> {
        &self.client
    }

    /// Whether this event type is selected in the emitter configuration
    pub fn forwards(&self, event_type: EventType) -> bool {
        self.client.config().events.contains(&event_type)
    }

    /// Register a hook for every forwarded event type of `entity_class`
    pub fn attach<R: HookRegistry + ?Sized>(&self, registry: &mut R, entity_class: &str) {
        for event_type in self.client.config().events.iter().copied() {
            let source = self.clone();
            let hook: LifecycleHook = Arc::new(move |entity: &dyn Entity, event: EventType| {
                source.dispatch(entity, event);
            });
            registry.register(entity_class, event_type, hook);
            debug!(entity_class, event_type = %event_type, "lifecycle hook attached");
        }
    }

    /// Capture now, deliver in the background.
    ///
    /// Returns `None` when the event is not forwarded or the descriptor could
    /// not be built. Delivery failures are logged by the client; the handle
    /// can be awaited by callers that want the outcome.
    pub fn dispatch(
        &self,
        entity: &dyn Entity,
        event_type: EventType,
    ) -> Option<JoinHandle<Result<DeliveryReceipt>>> {
        if !self.forwards(event_type) {
            return None;
        }

        let descriptor = match capture(entity, event_type) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                error!(
                    entity_class = entity.entity_class(),
                    event_type = %event_type,
                    error = %e,
                    "failed to capture lifecycle event"
                );
                return None;
            }
        };

        let client = self.client.clone();
        Some(
            self.runtime
                .spawn(async move { client.deliver_configured(&descriptor).await }),
        )
    }

    /// Capture now and deliver on the caller's task, regardless of the
    /// configured event selection
    pub fn emit(
        &self,
        entity: &dyn Entity,
        event_type: EventType,
    ) -> impl Future<Output = Result<DeliveryReceipt>> + Send + use<T> {
        let captured = capture(entity, event_type);
        let client = self.client.clone();
        async move { client.deliver_configured(&captured?).await }
    }
}
