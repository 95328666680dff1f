//! In-process event bus with RAII subscriptions.

use std::sync::{
    Arc, Weak,
    atomic::{AtomicU64, Ordering},
};

use {async_trait::async_trait, dashmap::DashMap, tracing::trace};

use crate::event::InboundEvent;

/// Receives events published on an [`EventBus`].
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &InboundEvent);
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    handlers: DashMap<u64, Arc<dyn EventHandler>>,
}

/// Fan-out of inbound events to every live subscriber.
///
/// Cloning is cheap; clones share the same subscriber set.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. It stays subscribed until the returned
    /// [`Subscription`] is dropped or cancelled.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.handlers.insert(id, handler);
        trace!(subscription = id, "event handler subscribed");
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every handler subscribed at the time of the call,
    /// in subscription order. Returns how many handlers saw the event.
    pub async fn publish(&self, event: &InboundEvent) -> usize {
        // Snapshot so no map guard is held across an await.
        let mut handlers: Vec<(u64, Arc<dyn EventHandler>)> = self
            .inner
            .handlers
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        handlers.sort_by_key(|(id, _)| *id);

        for (_, handler) in &handlers {
            handler.handle(event).await;
        }
        handlers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.len()
    }
}

/// Handle for one bus subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the handler is still registered on a live bus.
    pub fn is_active(&self) -> bool {
        self.bus
            .upgrade()
            .is_some_and(|bus| bus.handlers.contains_key(&self.id))
    }

    /// Unsubscribe now. Equivalent to dropping the handle.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.handlers.remove(&self.id);
            trace!(subscription = self.id, "event handler unsubscribed");
        }
    }
}
