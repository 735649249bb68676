//! Process-local key-value backend with simulated tabs.
//!
//! A [`MemoryStore`] is one "tab". [`MemoryStore::open_tab`] opens another
//! handle over the same map; writes made through one handle are queued as
//! [`StorageEvent`]s in every other live handle's inbox, the way a browser
//! raises `storage` events only in tabs other than the writer.
//!
//! # Architecture
//!
//! The map and the inbox registry live in one `Rc<RefCell<..>>`. Inboxes are
//! registered as `Weak` references and pruned lazily when a write finds a
//! dropped tab.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};

use relief_core::StoreError;

use crate::kv::{KeyValueStore, StorageEvent};

type Inbox = Rc<RefCell<VecDeque<StorageEvent>>>;

#[derive(Default)]
struct Shared {
    entries: BTreeMap<String, String>,
    inboxes: Vec<(u64, Weak<RefCell<VecDeque<StorageEvent>>>)>,
    next_tab: u64,
}

impl Shared {
    fn register(&mut self, inbox: &Inbox) -> u64 {
        let id = self.next_tab;
        self.next_tab += 1;
        self.inboxes.push((id, Rc::downgrade(inbox)));
        id
    }

    fn broadcast(&mut self, origin: u64, events: &[StorageEvent]) {
        if events.is_empty() {
            return;
        }
        self.inboxes.retain(|(tab, weak)| {
            let Some(inbox) = weak.upgrade() else {
                return false;
            };
            if *tab != origin {
                inbox.borrow_mut().extend(events.iter().cloned());
            }
            true
        });
    }

    fn put(&mut self, key: &str, value: &str) -> Option<StorageEvent> {
        let old = self.entries.insert(key.to_owned(), value.to_owned());
        if old.as_deref() == Some(value) {
            return None;
        }
        Some(StorageEvent {
            key: key.to_owned(),
            old_value: old,
            new_value: Some(value.to_owned()),
        })
    }
}

/// In-memory backend handle. See the module docs.
pub struct MemoryStore {
    shared: Rc<RefCell<Shared>>,
    inbox: Inbox,
    tab: u64,
}

impl MemoryStore {
    /// Create an empty store with a single tab.
    #[must_use]
    pub fn new() -> Self {
        let shared = Rc::new(RefCell::new(Shared::default()));
        let inbox = Inbox::default();
        let tab = shared.borrow_mut().register(&inbox);
        Self { shared, inbox, tab }
    }

    /// Open another tab over the same entries.
    #[must_use]
    pub fn open_tab(&self) -> Self {
        let inbox = Inbox::default();
        let tab = self.shared.borrow_mut().register(&inbox);
        Self {
            shared: Rc::clone(&self.shared),
            inbox,
            tab,
        }
    }

    /// Number of notifications waiting in this tab's inbox.
    #[must_use]
    pub fn pending_changes(&self) -> usize {
        self.inbox.borrow().len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("tab", &self.tab)
            .field("keys", &self.shared.borrow().entries.len())
            .field("pending_changes", &self.inbox.borrow().len())
            .finish()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.shared.borrow().entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut shared = self.shared.borrow_mut();
        if let Some(event) = shared.put(key, value) {
            shared.broadcast(self.tab, &[event]);
        }
        Ok(())
    }

    /// All entries land under a single borrow, so no reader can observe a
    /// half-applied batch.
    fn set_many(&self, entries: &[(String, String)]) -> Result<(), StoreError> {
        let mut shared = self.shared.borrow_mut();
        let events: Vec<StorageEvent> = entries
            .iter()
            .filter_map(|(key, value)| shared.put(key, value))
            .collect();
        shared.broadcast(self.tab, &events);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut shared = self.shared.borrow_mut();
        if let Some(old) = shared.entries.remove(key) {
            let event = StorageEvent {
                key: key.to_owned(),
                old_value: Some(old),
                new_value: None,
            };
            shared.broadcast(self.tab, &[event]);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.shared.borrow().entries.keys().cloned().collect())
    }

    fn take_external_changes(&self) -> Result<Vec<StorageEvent>, StoreError> {
        Ok(self.inbox.borrow_mut().drain(..).collect())
    }
}
