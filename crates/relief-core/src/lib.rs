#![forbid(unsafe_code)]

//! Core types for the relief data layer.
//!
//! This crate holds everything that is shared between the storage backends and
//! the runtime: the [`Resource`](resource::Resource) and
//! [`Response`](response::Response) records, their status machines, the closed
//! set of [`ChangeKind`](event::ChangeKind)s published on the event bus, the
//! typed [`StoreKey`](keys::StoreKey) namespace, and the error types.
//!
//! Nothing here performs I/O.

pub mod error;
pub mod event;
pub mod keys;
pub mod resource;
pub mod response;
pub mod role;

pub use error::{ReliefError, ReliefResult, StoreError};
pub use event::ChangeKind;
pub use keys::StoreKey;
pub use resource::{
    Category, Item, NewResource, Resource, ResourceKind, ResourcePatch, ResourceStatus,
};
pub use response::{Response, ResponseKind, ResponseStatus};
pub use role::UserRole;

/// Milliseconds since the Unix epoch.
pub type Millis = u64;
