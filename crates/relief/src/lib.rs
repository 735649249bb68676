#![forbid(unsafe_code)]

//! Offline-first data layer for disaster-relief coordination.
//!
//! Victims post needs, donors and organisations post offers, and responders
//! act on them. Records live in a local key-value store shared between tabs;
//! every write raises a change notification on an in-process bus so views can
//! refresh.
//!
//! Most hosts only need the [`prelude`] and a [`ReliefHub`].

pub use relief_core as core;
pub use relief_runtime as runtime;
pub use relief_store as store;

pub use relief_core::{
    Category, ChangeKind, Item, NewResource, ReliefError, ReliefResult, Resource, ResourceKind,
    ResourcePatch, ResourceStatus, Response, ResponseKind, ResponseStatus, StoreError, StoreKey,
    UserRole,
};
pub use relief_runtime::{
    CleanupReport, DerivedViews, EventBus, ReliefConfig, ReliefHub, ResourceFilter, Responder,
    ResponseOutcome, StatusCounts, Subscription, SubscriptionSet, UserDirectory, UserProfile,
};
#[cfg(feature = "file-backend")]
pub use relief_store::FileStore;
pub use relief_store::{KeyValueStore, MemoryStore};

pub mod prelude {
    pub use crate::{
        Category, ChangeKind, NewResource, ReliefError, ReliefHub, ReliefResult, Resource,
        ResourceFilter, ResourceKind, ResourcePatch, ResourceStatus, Responder, Response,
        ResponseStatus, UserRole,
    };
}
