//! Re-raise changes made by other tabs or processes on the local bus.
//!
//! The backend queues a [`StorageEvent`] for every write made through another
//! handle. [`CrossTabSync::pump`] drains that queue, maps each event to the
//! [`ChangeKind`]s it implies, and publishes them here. The host calls `pump`
//! from its event loop (or on a timer for the file backend).
//!
//! # Mapping
//!
//! | Key | New ids present | Existing record changed or removed |
//! |-----|-----------------|------------------------------------|
//! | `resources` | `resource-created` | `resource-updated` |
//! | `responses_{user}` | `response-created` | `response-updated` |
//! | `responded_requests_{user}` | `response-updated` | `response-updated` |
//! | anything else | none | none |
//!
//! Backends drop writes that leave a value unchanged, so a repair that only
//! rewrites a user's index arrives as an index-only event. When the same
//! drain also carries that user's response collection, the index event is
//! folded into it. Values that fail to parse map to the `*-updated` kind so
//! subscribers still re-read.
//!
//! # Invariants
//!
//! 1. Self-originated writes never reach `pump` (the backend filters them).
//! 2. One pump publishes each kind at most once, in first-seen order.
//! 3. Every external change to a key the views read raises at least one
//!    kind.

use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use relief_core::{ChangeKind, ReliefResult, StoreKey};
use relief_store::{KeyValueStore, StorageEvent};
use serde_json::Value;
use tracing::{debug, trace};

use crate::bus::EventBus;

#[derive(Clone)]
pub struct CrossTabSync {
    backend: Rc<dyn KeyValueStore>,
    bus: EventBus,
}

impl CrossTabSync {
    #[must_use]
    pub fn new(backend: Rc<dyn KeyValueStore>, bus: EventBus) -> Self {
        Self { backend, bus }
    }

    /// Drain external changes and publish the matching kinds. Returns the
    /// kinds published, in order.
    pub fn pump(&self) -> ReliefResult<Vec<ChangeKind>> {
        let events = self.backend.take_external_changes()?;
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let collections_touched: HashSet<String> = events
            .iter()
            .filter_map(|event| match StoreKey::parse(&event.key) {
                Some(StoreKey::Responses(user)) => Some(user),
                _ => None,
            })
            .collect();

        let mut kinds: Vec<ChangeKind> = Vec::new();
        for event in &events {
            if let Some(StoreKey::RespondedRequests(user)) = StoreKey::parse(&event.key)
                && collections_touched.contains(&user)
            {
                trace!(key = %event.key, "index change folded into its collection");
                continue;
            }
            for kind in classify(event) {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
        }
        debug!(events = events.len(), kinds = ?kinds, "replaying external changes");
        for &kind in &kinds {
            self.bus.publish(kind);
        }
        Ok(kinds)
    }
}

impl std::fmt::Debug for CrossTabSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossTabSync").field("bus", &self.bus).finish()
    }
}

/// Kinds implied by one storage event.
#[must_use]
pub fn classify(event: &StorageEvent) -> Vec<ChangeKind> {
    let (created, updated) = match StoreKey::parse(&event.key) {
        Some(StoreKey::Resources) => (ChangeKind::ResourceCreated, ChangeKind::ResourceUpdated),
        Some(StoreKey::Responses(_)) => (ChangeKind::ResponseCreated, ChangeKind::ResponseUpdated),
        Some(StoreKey::RespondedRequests(_)) => return vec![ChangeKind::ResponseUpdated],
        None => {
            trace!(key = %event.key, "ignoring external change");
            return Vec::new();
        }
    };

    let (Some(old), Some(new)) = (
        records_by_id(event.old_value.as_deref()),
        records_by_id(event.new_value.as_deref()),
    ) else {
        return vec![updated];
    };

    let mut kinds = Vec::new();
    if new.keys().any(|id| !old.contains_key(id)) {
        kinds.push(created);
    }
    let changed = old.iter().any(|(id, record)| new.get(id) != Some(record));
    if changed || kinds.is_empty() {
        kinds.push(updated);
    }
    kinds
}

/// Parse a stored collection into `id → record`. Absent values are empty;
/// unparseable values are `None`.
fn records_by_id(raw: Option<&str>) -> Option<BTreeMap<String, Value>> {
    let Some(raw) = raw else {
        return Some(BTreeMap::new());
    };
    let Value::Array(items) = serde_json::from_str::<Value>(raw).ok()? else {
        return None;
    };
    let mut out = BTreeMap::new();
    for item in items {
        let id = item.get("id").and_then(Value::as_str)?.to_owned();
        out.insert(id, item);
    }
    Some(out)
}
