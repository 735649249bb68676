//! Typed whole-collection access over a [`KeyValueStore`].
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Key absent | First run | Empty collection |
//! | Value unparseable | Corrupt data, schema drift | Logged at `warn`, empty collection |
//! | Backend read fails | I/O | Logged at `warn`, empty collection |
//! | Backend write fails | I/O | `StoreError` returned to caller |
//!
//! [`CollectionStore::read`] fails open: a corrupt local store must not take
//! down every surface that renders from it. The next write replaces the
//! unreadable value, so its contents are lost.
//!
//! [`CollectionStore::try_read`] is the strict variant. It keeps "absent"
//! apart from "present but unreadable" and returns the latter as
//! [`StoreError`]. Anything that deletes data based on what it read must use
//! it, or a swallowed error turns into a purge.

use std::fmt;
use std::rc::Rc;

use relief_core::{StoreError, StoreKey};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::kv::KeyValueStore;

/// Typed front for a shared key-value backend. Cloning shares the backend.
#[derive(Clone)]
pub struct CollectionStore {
    backend: Rc<dyn KeyValueStore>,
}

impl CollectionStore {
    #[must_use]
    pub fn new(backend: Rc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    #[must_use]
    pub fn backend(&self) -> &Rc<dyn KeyValueStore> {
        &self.backend
    }

    /// Read a whole collection, failing open to an empty one.
    #[must_use]
    pub fn read<T: DeserializeOwned>(&self, key: &StoreKey) -> Vec<T> {
        match self.try_read(key) {
            Ok(items) => items.unwrap_or_default(),
            Err(err @ StoreError::Corrupt { .. }) => {
                warn!(key = %key, error = %err, "collection is not valid JSON; treating as empty");
                Vec::new()
            }
            Err(err) => {
                warn!(key = %key, error = %err, "collection read failed; treating as empty");
                Vec::new()
            }
        }
    }

    /// Read a whole collection. `Ok(None)` means the key is absent.
    pub fn try_read<T: DeserializeOwned>(&self, key: &StoreKey) -> Result<Option<Vec<T>>, StoreError> {
        let raw_key = key.to_string();
        let Some(raw) = self.backend.get(&raw_key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { key: raw_key, source })
    }

    /// Replace a whole collection.
    pub fn write<T: Serialize>(&self, key: &StoreKey, items: &[T]) -> Result<(), StoreError> {
        let mut batch = CollectionBatch::new();
        batch.put(key, items)?;
        self.commit(batch)
    }

    /// Persist every collection in `batch` with one backend call.
    pub fn commit(&self, batch: CollectionBatch) -> Result<(), StoreError> {
        if batch.entries.is_empty() {
            return Ok(());
        }
        debug!(keys = ?batch.keys().collect::<Vec<_>>(), "writing collections");
        self.backend.set_many(&batch.entries)
    }

    /// Every key in the store that belongs to the collection namespace.
    #[must_use]
    pub fn keys(&self) -> Vec<StoreKey> {
        match self.backend.keys() {
            Ok(keys) => keys.iter().filter_map(|k| StoreKey::parse(k)).collect(),
            Err(err) => {
                warn!(error = %err, "listing store keys failed; treating as empty");
                Vec::new()
            }
        }
    }

    /// Ids of every user that owns a response collection or an index.
    #[must_use]
    pub fn responder_ids(&self) -> Vec<String> {
        let mut users: Vec<String> = self
            .keys()
            .into_iter()
            .filter_map(|key| key.user_id().map(str::to_owned))
            .collect();
        users.sort();
        users.dedup();
        users
    }
}

impl fmt::Debug for CollectionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionStore").finish_non_exhaustive()
    }
}

/// Serialized collections waiting to be written together.
#[derive(Debug, Default)]
pub struct CollectionBatch {
    entries: Vec<(String, String)>,
}

impl CollectionBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `items` under `key`. A later `put` for the same key
    /// replaces the earlier one.
    pub fn put<T: Serialize>(&mut self, key: &StoreKey, items: &[T]) -> Result<&mut Self, StoreError> {
        let raw_key = key.to_string();
        let value = serde_json::to_string(items).map_err(|source| StoreError::Serialize {
            key: raw_key.clone(),
            source,
        })?;
        self.entries.retain(|(k, _)| *k != raw_key);
        self.entries.push((raw_key, value));
        Ok(self)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
