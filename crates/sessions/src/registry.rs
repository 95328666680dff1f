//! Concurrent key → session registry.
//!
//! Invariants:
//! - at most one live session per key; `register` is an atomic
//!   check-and-insert on the map entry,
//! - events for one session are handled one at a time, in the order they
//!   acquire the session lock (tokio's mutex is FIFO),
//! - once a session is torn down its key is free, its bus subscription is
//!   gone, and any event still racing toward it is a no-op.

use std::{
    ops::{Deref, DerefMut},
    sync::{
        Arc, Mutex as StdMutex, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use {
    async_trait::async_trait,
    dashmap::{DashMap, mapref::entry::Entry},
    gamehall_channels::{EventBus, EventHandler, InboundEvent, Subscription},
    tokio::sync::{Mutex, OwnedMutexGuard},
    tracing::{debug, info, warn},
};

use crate::{
    Error, Result,
    key::SessionKey,
    session::{Session, SessionFlow},
};

/// Outcome of delivering one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The session handled the event and is still live.
    Delivered,
    /// The session handled the event and reached its terminal state.
    Ended,
    /// No live session for the key; the event was dropped.
    NoSession,
}

struct Slot<S> {
    generation: u64,
    session: Arc<Mutex<S>>,
    ended: AtomicBool,
    subscription: StdMutex<Option<Subscription>>,
}

struct Inner<S> {
    kind: &'static str,
    bus: EventBus,
    next_generation: AtomicU64,
    sessions: DashMap<SessionKey, Arc<Slot<S>>>,
}

/// Registry of live sessions of one kind.
///
/// Cloning is cheap; clones share the same map.
pub struct SessionRegistry<S: Session> {
    inner: Arc<Inner<S>>,
}

impl<S: Session> Clone for SessionRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Session> SessionRegistry<S> {
    pub fn new(kind: &'static str, bus: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                kind,
                bus,
                next_generation: AtomicU64::new(0),
                sessions: DashMap::new(),
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.inner.kind
    }

    /// Register `session` under `key` and subscribe it to the event bus.
    ///
    /// Fails with [`Error::AlreadyActive`] if `key` already has a live
    /// session; the existing session is left untouched.
    pub fn register(&self, key: SessionKey, session: S) -> Result<()> {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let route: Arc<dyn EventHandler> = Arc::new(Route::<S> {
            key,
            generation,
            registry: Arc::downgrade(&self.inner),
        });
        // Subscribed before insertion; until the slot exists with this
        // generation the route ignores everything.
        let subscription = self.inner.bus.subscribe(route);

        let rejected = match self.inner.sessions.entry(key) {
            Entry::Occupied(_) => Some(subscription),
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(Slot {
                    generation,
                    session: Arc::new(Mutex::new(session)),
                    ended: AtomicBool::new(false),
                    subscription: StdMutex::new(Some(subscription)),
                }));
                None
            },
        };

        match rejected {
            Some(subscription) => {
                drop(subscription);
                debug!(kind = self.inner.kind, %key, "session already active");
                Err(Error::AlreadyActive { key })
            },
            None => {
                info!(kind = self.inner.kind, %key, "session registered");
                Ok(())
            },
        }
    }

    /// Deliver `event` to the session under `key`, if any.
    pub async fn dispatch(&self, key: &SessionKey, event: &InboundEvent) -> Result<Dispatch> {
        match self.inner.slot(key) {
            Some(slot) => self.inner.deliver(key, slot, event).await,
            None => Ok(Dispatch::NoSession),
        }
    }

    /// Drop the session under `key` without running its end hook.
    /// Returns false if there was nothing to remove.
    pub fn unregister(&self, key: &SessionKey) -> bool {
        match self.inner.slot(key) {
            Some(slot) => self.inner.teardown(key, &slot, "unregistered"),
            None => false,
        }
    }

    /// End the session under `key`: waits for any in-flight event, runs the
    /// session's end hook, then tears it down. Returns false if no live
    /// session was found.
    pub async fn end(&self, key: &SessionKey) -> Result<bool> {
        let Some(slot) = self.inner.slot(key) else {
            return Ok(false);
        };
        let mut session = slot.session.lock().await;
        if slot.ended.load(Ordering::Acquire) {
            return Ok(false);
        }
        let hook = session.on_end().await;
        self.inner.teardown(key, &slot, "ended");
        hook.map(|()| true)
    }

    /// Exclusive access to a live session, e.g. for a command that advances
    /// a turn. Events for the session wait until the guard is dropped.
    pub async fn lock(&self, key: &SessionKey) -> Option<SessionGuard<S>> {
        let slot = self.inner.slot(key)?;
        let guard = Arc::clone(&slot.session).lock_owned().await;
        if slot.ended.load(Ordering::Acquire) {
            return None;
        }
        Some(SessionGuard {
            key: *key,
            slot,
            guard,
            registry: Arc::clone(&self.inner),
        })
    }

    /// Current state summary of the session under `key`.
    pub async fn render(&self, key: &SessionKey) -> Option<String> {
        self.lock(key).await.map(|session| session.render_state())
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.inner.sessions.contains_key(key)
    }

    pub fn keys(&self) -> Vec<SessionKey> {
        let mut keys: Vec<SessionKey> = self.inner.sessions.iter().map(|e| *e.key()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }
}

impl<S: Session> Inner<S> {
    fn slot(&self, key: &SessionKey) -> Option<Arc<Slot<S>>> {
        self.sessions.get(key).map(|entry| Arc::clone(entry.value()))
    }

    async fn deliver(
        &self,
        key: &SessionKey,
        slot: Arc<Slot<S>>,
        event: &InboundEvent,
    ) -> Result<Dispatch> {
        let mut session = slot.session.lock().await;
        if slot.ended.load(Ordering::Acquire) {
            return Ok(Dispatch::NoSession);
        }
        match session.handle_event(event).await? {
            SessionFlow::Continue => Ok(Dispatch::Delivered),
            SessionFlow::End => {
                self.teardown(key, &slot, "completed");
                Ok(Dispatch::Ended)
            },
        }
    }

    /// Mark `slot` ended, free its key, and release its subscription.
    /// Only the first call for a slot does anything.
    fn teardown(&self, key: &SessionKey, slot: &Arc<Slot<S>>, reason: &'static str) -> bool {
        if slot.ended.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.sessions
            .remove_if(key, |_, current| Arc::ptr_eq(current, slot));
        let subscription = match slot.subscription.lock() {
            Ok(mut sub) => sub.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(subscription);
        info!(kind = self.kind, %key, reason, "session ended");
        true
    }
}

/// Per-session bus subscriber. Holds only a weak link back to the registry.
struct Route<S> {
    key: SessionKey,
    generation: u64,
    registry: Weak<Inner<S>>,
}

#[async_trait]
impl<S: Session> EventHandler for Route<S> {
    async fn handle(&self, event: &InboundEvent) {
        if !S::routes(&self.key, event) {
            return;
        }
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        let Some(slot) = inner
            .slot(&self.key)
            .filter(|slot| slot.generation == self.generation)
        else {
            return;
        };
        match inner.deliver(&self.key, slot, event).await {
            Ok(outcome) => {
                debug!(kind = inner.kind, key = %self.key, event = event.kind(), ?outcome, "routed event");
            },
            Err(e) => {
                warn!(kind = inner.kind, key = %self.key, error = %e, "session failed to handle event");
            },
        }
    }
}

/// Locked access to one live session, from [`SessionRegistry::lock`].
pub struct SessionGuard<S: Session> {
    key: SessionKey,
    slot: Arc<Slot<S>>,
    guard: OwnedMutexGuard<S>,
    registry: Arc<Inner<S>>,
}

impl<S: Session> SessionGuard<S> {
    pub fn key(&self) -> SessionKey {
        self.key
    }

    /// Run the end hook and tear the session down.
    pub async fn end(mut self) -> Result<()> {
        let hook = self.guard.on_end().await;
        self.registry.teardown(&self.key, &self.slot, "ended");
        hook
    }

    /// Tear the session down after it reached a terminal state on its own.
    pub fn complete(self) {
        self.registry.teardown(&self.key, &self.slot, "completed");
    }
}

impl<S: Session> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.guard
    }
}

impl<S: Session> DerefMut for SessionGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.guard
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        gamehall_channels::InboundMessage,
        gamehall_common::{ChannelId, MessageId, UserRef},
    };

    /// Counts messages; ends when it sees "stop".
    struct Echo {
        seen: Vec<String>,
        ended_by_hook: bool,
    }

    impl Echo {
        fn new() -> Self {
            Self {
                seen: Vec::new(),
                ended_by_hook: false,
            }
        }
    }

    #[async_trait]
    impl Session for Echo {
        fn kind(&self) -> &'static str {
            "echo"
        }

        async fn handle_event(&mut self, event: &InboundEvent) -> Result<SessionFlow> {
            let InboundEvent::MessageReceived(msg) = event else {
                return Ok(SessionFlow::Continue);
            };
            self.seen.push(msg.content.clone());
            Ok(if msg.content == "stop" {
                SessionFlow::End
            } else {
                SessionFlow::Continue
            })
        }

        async fn on_end(&mut self) -> Result<()> {
            self.ended_by_hook = true;
            Ok(())
        }

        fn render_state(&self) -> String {
            format!("{} messages", self.seen.len())
        }
    }

    fn message(channel: u64, content: &str) -> InboundEvent {
        InboundEvent::MessageReceived(InboundMessage {
            id: MessageId(1),
            channel_id: ChannelId(channel),
            guild_id: None,
            author: UserRef::new(1, "ann"),
            content: content.into(),
            is_direct: false,
            roles: Vec::new(),
        })
    }

    const KEY: SessionKey = SessionKey::Channel(ChannelId(7));

    #[tokio::test]
    async fn second_register_fails_and_keeps_first() {
        let bus = EventBus::new();
        let registry = SessionRegistry::new("echo", bus.clone());
        registry.register(KEY, Echo::new()).unwrap();

        let mut second = Echo::new();
        second.seen.push("marker".into());
        assert!(matches!(
            registry.register(KEY, second),
            Err(Error::AlreadyActive { key }) if key == KEY
        ));
        assert_eq!(registry.render(&KEY).await.unwrap(), "0 messages");
        // The rejected registration left no subscription behind.
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn bus_events_reach_only_the_keyed_session() {
        let bus = EventBus::new();
        let registry = SessionRegistry::new("echo", bus.clone());
        registry.register(KEY, Echo::new()).unwrap();

        bus.publish(&message(7, "hello")).await;
        bus.publish(&message(8, "elsewhere")).await;

        let session = registry.lock(&KEY).await.unwrap();
        assert_eq!(session.seen, vec!["hello"]);
    }

    #[tokio::test]
    async fn terminal_event_frees_key_and_subscription() {
        let bus = EventBus::new();
        let registry = SessionRegistry::new("echo", bus.clone());
        registry.register(KEY, Echo::new()).unwrap();

        bus.publish(&message(7, "stop")).await;
        assert!(!registry.contains(&KEY));
        assert_eq!(bus.subscriber_count(), 0);

        assert_eq!(
            registry.dispatch(&KEY, &message(7, "late")).await.unwrap(),
            Dispatch::NoSession
        );
        registry.register(KEY, Echo::new()).unwrap();
    }

    #[tokio::test]
    async fn dispatch_to_absent_key_is_noop() {
        let registry: SessionRegistry<Echo> = SessionRegistry::new("echo", EventBus::new());
        assert_eq!(
            registry.dispatch(&KEY, &message(7, "x")).await.unwrap(),
            Dispatch::NoSession
        );
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let bus = EventBus::new();
        let registry = SessionRegistry::new("echo", bus.clone());
        registry.register(KEY, Echo::new()).unwrap();

        assert!(registry.unregister(&KEY));
        assert!(!registry.unregister(&KEY));
        assert!(registry.is_empty());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn end_runs_hook_and_stale_guard_sees_nothing() {
        let registry = SessionRegistry::new("echo", EventBus::new());
        registry.register(KEY, Echo::new()).unwrap();

        let guard = registry.lock(&KEY).await.unwrap();
        assert_eq!(guard.key(), KEY);
        guard.end().await.unwrap();

        assert!(registry.lock(&KEY).await.is_none());
        assert!(!registry.end(&KEY).await.unwrap());
    }

    #[tokio::test]
    async fn explicit_end_via_registry() {
        let registry = SessionRegistry::new("echo", EventBus::new());
        registry.register(KEY, Echo::new()).unwrap();
        assert!(registry.end(&KEY).await.unwrap());
        assert!(registry.keys().is_empty());
    }
}
