//! Backend contract for the durable store.
//!
//! # Invariants
//!
//! 1. `set` and `set_many` replace whole values; a reader never observes a
//!    partially written value.
//! 2. [`take_external_changes`](KeyValueStore::take_external_changes) only
//!    reports writes made through *other* handles. A handle's own writes are
//!    never echoed back to it.
//! 3. Writing a value identical to the stored one produces no change
//!    notification.

use relief_core::StoreError;

/// A change made to the store by another handle (tab or process).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Write several keys in one call.
    ///
    /// The default writes keys one at a time, in order. Backends that can
    /// apply the whole batch atomically should override it.
    fn set_many(&self, entries: &[(String, String)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// All keys currently present, in ascending order.
    fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Drain notifications of writes made elsewhere since the last call.
    fn take_external_changes(&self) -> Result<Vec<StorageEvent>, StoreError>;
}
