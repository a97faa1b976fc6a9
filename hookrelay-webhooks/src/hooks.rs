//! Lifecycle hook registration
//!
//! Hosts own their hook mechanism; the event source only needs something it
//! can register callbacks with. [`LifecycleHooks`] is a small in-memory
//! registry for hosts that do not have one.

use crate::{Attributes, EventType};
use std::collections::HashMap;
use std::sync::Arc;

/// A persisted record as seen by the event source
pub trait Entity {
    /// Fully-qualified type name, e.g. `App\Models\Order`
    fn entity_class(&self) -> &str;

    /// Current field values, after the mutation
    fn attributes(&self) -> Attributes;

    /// Field values before the mutation, if the host tracks them
    fn original_attributes(&self) -> Option<Attributes> {
        None
    }
}

/// Callback fired by the host for one entity and lifecycle event
pub type LifecycleHook = Arc<dyn Fn(&dyn Entity, EventType) + Send + Sync>;

/// Callback-registration capability of a host framework
pub trait HookRegistry {
    fn register(&mut self, entity_class: &str, event_type: EventType, hook: LifecycleHook);
}

/// In-memory hook registry keyed by entity class and event type
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    hooks: HashMap<(String, EventType), Vec<LifecycleHook>>,
}

impl std::fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("registrations", &self.count())
            .finish()
    }
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke every hook registered for the entity's class and this event.
    /// Returns the number of hooks called.
    pub fn fire(&self, entity: &dyn Entity, event_type: EventType) -> usize {
        let key = (entity.entity_class().to_string(), event_type);
        let Some(hooks) = self.hooks.get(&key) else {
            return 0;
        };

        for hook in hooks {
            hook(entity, event_type);
        }
        hooks.len()
    }

    /// Number of hooks registered for one class and event
    pub fn hooks_for(&self, entity_class: &str, event_type: EventType) -> usize {
        self.hooks
            .get(&(entity_class.to_string(), event_type))
            .map_or(0, Vec::len)
    }

    /// Total number of registered hooks
    pub fn count(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    /// Remove every hook for an entity class, returning how many were removed
    pub fn unregister_class(&mut self, entity_class: &str) -> usize {
        let mut removed = 0;
        self.hooks.retain(|(class, _), hooks| {
            if class == entity_class {
                removed += hooks.len();
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn clear(&mut self) {
        self.hooks.clear();
    }
}

impl HookRegistry for LifecycleHooks {
    fn register(&mut self, entity_class: &str, event_type: EventType, hook: LifecycleHook) {
        self.hooks
            .entry((entity_class.to_string(), event_type))
            .or_default()
            .push(hook);
    }
}

/// Owned entity snapshot, for hosts that model records dynamically
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub entity_class: String,
    pub attributes: Attributes,
    pub original: Option<Attributes>,
}

impl EntitySnapshot {
    pub fn new(entity_class: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            entity_class: entity_class.into(),
            attributes,
            original: None,
        }
    }

    pub fn with_original(mut self, original: Attributes) -> Self {
        self.original = Some(original);
        self
    }
}

impl Entity for EntitySnapshot {
    fn entity_class(&self) -> &str {
        &self.entity_class
    }

    fn attributes(&self) -> Attributes {
        self.attributes.clone()
    }

    fn original_attributes(&self) -> Option<Attributes> {
        self.original.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_hook(counter: &Arc<AtomicUsize>) -> LifecycleHook {
        let counter = Arc::clone(counter);
        Arc::new(move |_: &dyn Entity, _: EventType| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn order() -> EntitySnapshot {
        EntitySnapshot::new("Order", Attributes::from([("id".to_string(), json!(1))]))
    }

    #[test]
    fn test_register_and_fire() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut hooks = LifecycleHooks::new();
        hooks.register("Order", EventType::Created, counting_hook(&counter));

        assert_eq!(hooks.fire(&order(), EventType::Created), 1);
        assert_eq!(hooks.fire(&order(), EventType::Deleted), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fire_fans_out_to_every_hook() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut hooks = LifecycleHooks::new();
        hooks.register("Order", EventType::Saved, counting_hook(&counter));
        hooks.register("Order", EventType::Saved, counting_hook(&counter));
        hooks.register("Invoice", EventType::Saved, counting_hook(&counter));

        assert_eq!(hooks.hooks_for("Order", EventType::Saved), 2);
        assert_eq!(hooks.fire(&order(), EventType::Saved), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_hook_receives_entity_and_event() {
        let mut hooks = LifecycleHooks::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        hooks.register(
            "Order",
            EventType::Updated,
            Arc::new(move |entity: &dyn Entity, event: EventType| {
                sink.lock()
                    .unwrap()
                    .push((entity.entity_class().to_string(), event));
            }),
        );

        hooks.fire(&order(), EventType::Updated);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("Order".to_string(), EventType::Updated)]
        );
    }

    #[test]
    fn test_unregister_and_clear() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut hooks = LifecycleHooks::new();
        hooks.register("Order", EventType::Created, counting_hook(&counter));
        hooks.register("Order", EventType::Deleted, counting_hook(&counter));
        hooks.register("Invoice", EventType::Created, counting_hook(&counter));
        assert_eq!(hooks.count(), 3);

        assert_eq!(hooks.unregister_class("Order"), 2);
        assert_eq!(hooks.count(), 1);

        hooks.clear();
        assert_eq!(hooks.count(), 0);
    }
}
