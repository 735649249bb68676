#![forbid(unsafe_code)]

//! In-process publish/subscribe for collection changes.
//!
//! # Architecture
//!
//! `EventBus` uses `Rc<RefCell<..>>` for single-threaded shared ownership.
//! Handlers are stored as `Rc<dyn Fn()>` in registration order. Publishing
//! snapshots the matching handlers before invoking them, so a handler may
//! subscribe, unsubscribe, or publish again without a borrow conflict.
//!
//! # Invariants
//!
//! 1. Handlers for a kind run synchronously, in subscription order, before
//!    `publish` returns.
//! 2. Dropping a [`Subscription`] (or calling
//!    [`unsubscribe`](Subscription::unsubscribe)) removes the handler before
//!    the next publish.
//! 3. A handler added during a publish is not invoked by that publish.
//!
//! # Failure Modes
//!
//! - Handler panic: propagates to the caller of `publish`.
//! - Bus dropped while subscriptions are alive: dropping them is a no-op.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use relief_core::ChangeKind;
use tracing::trace;

type Handler = Rc<dyn Fn()>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<(u64, ChangeKind, Handler)>,
}

/// Process-local event bus. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<Registry>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`. The handler stays registered while the
    /// returned guard is alive.
    #[must_use = "dropping the subscription unsubscribes the handler"]
    pub fn subscribe(&self, kind: ChangeKind, handler: impl Fn() + 'static) -> Subscription {
        let mut registry = self.inner.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.handlers.push((id, kind, Rc::new(handler)));
        Subscription {
            registry: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Invoke every handler registered for `kind`. Returns how many ran.
    pub fn publish(&self, kind: ChangeKind) -> usize {
        let targets: Vec<Handler> = self
            .inner
            .borrow()
            .handlers
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, h)| Rc::clone(h))
            .collect();
        trace!(event = %kind, handlers = targets.len(), "publish");
        for handler in &targets {
            handler();
        }
        targets.len()
    }

    #[must_use]
    pub fn handler_count(&self, kind: ChangeKind) -> usize {
        self.inner
            .borrow()
            .handlers
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.inner.borrow().handlers.len())
            .finish()
    }
}

/// RAII guard for a registered handler.
#[must_use = "dropping the subscription unsubscribes the handler"]
pub struct Subscription {
    registry: Weak<RefCell<Registry>>,
    id: u64,
}

impl Subscription {
    /// Remove the handler now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        // The handler is dropped after the borrow ends: it may own other
        // subscriptions whose own drop needs the registry.
        let removed = {
            let mut registry = registry.borrow_mut();
            let pos = registry
                .handlers
                .iter()
                .position(|(id, _, _)| *id == self.id);
            pos.map(|pos| registry.handlers.remove(pos))
        };
        drop(removed);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Collects the subscriptions of one UI surface.
///
/// Dropping the set releases every subscription it holds, disconnecting the
/// surface from the bus in one step.
#[derive(Default)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(&mut self, sub: Subscription) {
        self.subscriptions.push(sub);
    }

    /// Subscribe one handler to several kinds.
    pub fn subscribe_all(
        &mut self,
        bus: &EventBus,
        kinds: &[ChangeKind],
        handler: impl Fn() + 'static,
    ) -> &mut Self {
        let handler: Handler = Rc::new(handler);
        for &kind in kinds {
            let h = Rc::clone(&handler);
            self.subscriptions.push(bus.subscribe(kind, move || h()));
        }
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}

impl fmt::Debug for SubscriptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionSet")
            .field("len", &self.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l1 = Rc::clone(&log);
        let _a = bus.subscribe(ChangeKind::ResourceCreated, move || l1.borrow_mut().push("a"));
        let l2 = Rc::clone(&log);
        let _b = bus.subscribe(ChangeKind::ResourceCreated, move || l2.borrow_mut().push("b"));

        assert_eq!(bus.publish(ChangeKind::ResourceCreated), 2);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn kinds_are_isolated() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = bus.subscribe(ChangeKind::ResponseCreated, move || h.set(h.get() + 1));

        bus.publish(ChangeKind::ResourceCreated);
        assert_eq!(hits.get(), 0);
        bus.publish(ChangeKind::ResponseCreated);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn drop_unsubscribes() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = bus.subscribe(ChangeKind::ResourceUpdated, move || h.set(h.get() + 1));
        bus.publish(ChangeKind::ResourceUpdated);
        sub.unsubscribe();
        bus.publish(ChangeKind::ResourceUpdated);
        assert_eq!(hits.get(), 1);
        assert_eq!(bus.handler_count(ChangeKind::ResourceUpdated), 0);
    }

    #[test]
    fn handler_may_publish_reentrantly() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));

        let inner_bus = bus.clone();
        let _chain = bus.subscribe(ChangeKind::ResponseCreated, move || {
            inner_bus.publish(ChangeKind::ResourceUpdated);
        });
        let h = Rc::clone(&hits);
        let _leaf = bus.subscribe(ChangeKind::ResourceUpdated, move || h.set(h.get() + 1));

        bus.publish(ChangeKind::ResponseCreated);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn handler_added_during_publish_waits_for_next_round() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let late: Rc<RefCell<Option<Subscription>>> = Rc::default();

        let (b, h, slot) = (bus.clone(), Rc::clone(&hits), Rc::clone(&late));
        let _first = bus.subscribe(ChangeKind::ResourceCreated, move || {
            if slot.borrow().is_none() {
                let h = Rc::clone(&h);
                *slot.borrow_mut() =
                    Some(b.subscribe(ChangeKind::ResourceCreated, move || h.set(h.get() + 1)));
            }
        });

        assert_eq!(bus.publish(ChangeKind::ResourceCreated), 1);
        assert_eq!(hits.get(), 0);
        assert_eq!(bus.publish(ChangeKind::ResourceCreated), 2);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn subscription_outliving_bus_is_harmless() {
        let sub = {
            let bus = EventBus::new();
            bus.subscribe(ChangeKind::ResourceCreated, || {})
        };
        drop(sub);
    }

    #[test]
    fn set_releases_everything() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let mut set = SubscriptionSet::new();
        let h = Rc::clone(&hits);
        set.subscribe_all(&bus, &ChangeKind::ALL, move || h.set(h.get() + 1));
        assert_eq!(set.len(), 4);

        for kind in ChangeKind::ALL {
            bus.publish(kind);
        }
        assert_eq!(hits.get(), 4);

        drop(set);
        bus.publish(ChangeKind::ResourceCreated);
        assert_eq!(hits.get(), 4);
    }
}
