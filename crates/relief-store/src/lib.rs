#![forbid(unsafe_code)]

//! Durable storage for the relief data layer.
//!
//! - [`KeyValueStore`]: the synchronous, string-keyed backend contract, with
//!   pull-based notification of writes made by *other* handles.
//! - [`MemoryStore`]: process-local backend. Handles opened with
//!   [`MemoryStore::open_tab`] share one map and see each other's writes as
//!   external changes.
//! - [`FileStore`]: one JSON file per key in a directory, shareable between
//!   processes (feature `file-backend`).
//! - [`CollectionStore`]: typed whole-collection reads and writes on top of a
//!   backend, failing open on unreadable data.

pub mod collection;
#[cfg(feature = "file-backend")]
pub mod file;
pub mod kv;
pub mod memory;

pub use collection::{CollectionBatch, CollectionStore};
#[cfg(feature = "file-backend")]
pub use file::FileStore;
pub use kv::{KeyValueStore, StorageEvent};
pub use memory::MemoryStore;
