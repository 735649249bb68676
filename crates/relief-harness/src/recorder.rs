//! Bus capture.

use std::cell::RefCell;
use std::rc::Rc;

use relief_core::ChangeKind;
use relief_runtime::{EventBus, SubscriptionSet};

/// Records every notification published on a bus, in order, until dropped.
pub struct EventRecorder {
    log: Rc<RefCell<Vec<ChangeKind>>>,
    _subscriptions: SubscriptionSet,
}

impl EventRecorder {
    #[must_use]
    pub fn attach(bus: &EventBus) -> Self {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut subscriptions = SubscriptionSet::new();
        for kind in ChangeKind::ALL {
            let log = Rc::clone(&log);
            subscriptions.hold(bus.subscribe(kind, move || log.borrow_mut().push(kind)));
        }
        Self {
            log,
            _subscriptions: subscriptions,
        }
    }

    #[must_use]
    pub fn kinds(&self) -> Vec<ChangeKind> {
        self.log.borrow().clone()
    }

    #[must_use]
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.log.borrow().iter().filter(|&&k| k == kind).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }

    /// Drain what has been recorded so far.
    pub fn take(&self) -> Vec<ChangeKind> {
        std::mem::take(&mut *self.log.borrow_mut())
    }
}

impl std::fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRecorder")
            .field("log", &self.log.borrow())
            .finish()
    }
}
