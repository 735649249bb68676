//! The relief hub: one owner for the store, bus, and repositories.
//!
//! Surfaces receive a `&ReliefHub` (or clones of its parts) instead of
//! constructing repositories themselves, so every write in a tab goes through
//! the same bus and the same timestamp source.
//!
//! ```
//! use relief_core::{Category, NewResource, ResourceKind, UserRole};
//! use relief_runtime::{ReliefHub, Responder};
//!
//! let hub = ReliefHub::in_memory();
//! let need = hub
//!     .resources()
//!     .create(NewResource::new(
//!         ResourceKind::Need,
//!         Category::Water,
//!         "Drinking water",
//!         "Twenty litres for a family of four",
//!         "North Camp",
//!         "victim-1",
//!         "Amina",
//!     ))
//!     .unwrap();
//!
//! let volunteer = Responder::new("vol-1", "Team X", UserRole::Volunteer);
//! assert!(hub.respond(&need.id, &volunteer).unwrap().is_created());
//! assert_eq!(hub.views().status_counts().addressing, 1);
//! ```

use std::fmt;
use std::rc::Rc;

use relief_core::{ChangeKind, ReliefError, ReliefResult, ResourceStatus, UserRole};
use relief_store::{CollectionStore, KeyValueStore, MemoryStore};
use tracing::{debug, info};

use crate::bus::{EventBus, Subscription};
use crate::clock::{Clock, MonotonicStamp, SystemClock};
use crate::config::{ReliefConfig, StorageConfig};
use crate::cross_tab::CrossTabSync;
use crate::resources::ResourceRepository;
use crate::responses::{CleanupReport, ResponseOutcome, ResponseRepository};
use crate::views::{DerivedViews, actionable_by};

/// The user acting on a resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Responder {
    pub user_id: String,
    /// Recorded as the assignee when the response auto-assigns.
    pub name: String,
    pub role: UserRole,
}

impl Responder {
    #[must_use]
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            role,
        }
    }
}

pub struct ReliefHub {
    store: CollectionStore,
    bus: EventBus,
    resources: ResourceRepository,
    responses: ResponseRepository,
    views: DerivedViews,
    sync: CrossTabSync,
    auto_assign: bool,
}

impl ReliefHub {
    #[must_use]
    pub fn builder() -> ReliefHubBuilder {
        ReliefHubBuilder::default()
    }

    /// A hub over a fresh, unshared [`MemoryStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::builder().build()
    }

    /// Build a hub with the backend and behaviour named in `config`.
    ///
    /// Does not install a log subscriber; call [`crate::logging::init`] for
    /// that.
    ///
    /// # Errors
    ///
    /// [`ReliefError::Storage`] when the file backend cannot open its
    /// directory, or [`ReliefError::Config`] when the file backend was
    /// compiled out.
    pub fn from_config(config: &ReliefConfig) -> ReliefResult<Self> {
        let backend: Rc<dyn KeyValueStore> = match &config.storage {
            StorageConfig::Memory => Rc::new(MemoryStore::new()),
            #[cfg(feature = "file-backend")]
            StorageConfig::File { dir } => Rc::new(relief_store::FileStore::open(dir)?),
            #[cfg(not(feature = "file-backend"))]
            StorageConfig::File { .. } => {
                return Err(ReliefError::Config(
                    "file storage requires the `file-backend` feature".to_owned(),
                ));
            }
        };
        info!(
            storage = ?config.storage,
            auto_assign = config.auto_assign_on_first_response,
            "relief hub starting"
        );
        Ok(Self::builder()
            .backend(backend)
            .auto_assign(config.auto_assign_on_first_response)
            .build())
    }

    #[must_use]
    pub fn resources(&self) -> &ResourceRepository {
        &self.resources
    }

    #[must_use]
    pub fn responses(&self) -> &ResponseRepository {
        &self.responses
    }

    #[must_use]
    pub fn views(&self) -> &DerivedViews {
        &self.views
    }

    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    #[must_use]
    pub fn store(&self) -> &CollectionStore {
        &self.store
    }

    #[must_use]
    pub fn sync(&self) -> &CrossTabSync {
        &self.sync
    }

    #[must_use]
    pub fn auto_assign(&self) -> bool {
        self.auto_assign
    }

    #[must_use = "dropping the subscription unsubscribes the handler"]
    pub fn subscribe(&self, kind: ChangeKind, handler: impl Fn() + 'static) -> Subscription {
        self.bus.subscribe(kind, handler)
    }

    /// Act on a resource as `responder`: file the inverse-kind response and,
    /// on the first response to a `pending` resource, assign it to the
    /// responder when auto-assign is on.
    ///
    /// Repeating the call returns the existing response and changes nothing.
    ///
    /// # Errors
    ///
    /// - [`ReliefError::NotFound`] for an unknown resource.
    /// - [`ReliefError::Validation`] when the responder's role may not act on
    ///   this kind of resource.
    /// - Any error from the response or resource write.
    pub fn respond(&self, request_id: &str, responder: &Responder) -> ReliefResult<ResponseOutcome> {
        let resource = self
            .resources
            .get_by_id(request_id)
            .ok_or_else(|| ReliefError::not_found("resource", request_id))?;
        if !actionable_by(&resource, responder.role) {
            return Err(ReliefError::validation(format!(
                "a {} cannot respond to a {}",
                responder.role, resource.kind
            )));
        }

        let outcome = self.responses.create_outcome(
            &resource.id,
            &responder.user_id,
            resource.kind.response_kind(),
            resource.category,
            &resource.title,
        )?;

        if outcome.is_created() && self.auto_assign && resource.status == ResourceStatus::Pending {
            debug!(id = %resource.id, assignee = %responder.name, "auto-assigning on first response");
            self.resources.assign(&resource.id, &responder.name)?;
        }
        Ok(outcome)
    }

    /// Replay changes written by other tabs onto this hub's bus.
    pub fn pump_external_changes(&self) -> ReliefResult<Vec<ChangeKind>> {
        self.sync.pump()
    }

    /// Run the response maintenance pass.
    pub fn cleanup(&self) -> ReliefResult<CleanupReport> {
        self.responses.cleanup_invalid_responses()
    }
}

impl fmt::Debug for ReliefHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReliefHub")
            .field("bus", &self.bus)
            .field("auto_assign", &self.auto_assign)
            .finish_non_exhaustive()
    }
}

pub struct ReliefHubBuilder {
    backend: Option<Rc<dyn KeyValueStore>>,
    clock: Option<Box<dyn Clock>>,
    auto_assign: bool,
}

impl Default for ReliefHubBuilder {
    fn default() -> Self {
        Self {
            backend: None,
            clock: None,
            auto_assign: true,
        }
    }
}

impl ReliefHubBuilder {
    #[must_use]
    pub fn backend(mut self, backend: Rc<dyn KeyValueStore>) -> Self {
        self.backend = Some(backend);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn auto_assign(mut self, enabled: bool) -> Self {
        self.auto_assign = enabled;
        self
    }

    #[must_use]
    pub fn build(self) -> ReliefHub {
        let backend = self
            .backend
            .unwrap_or_else(|| Rc::new(MemoryStore::new()));
        let clock = self.clock.unwrap_or_else(|| Box::new(SystemClock));
        let stamp = Rc::new(MonotonicStamp::new(clock));
        let store = CollectionStore::new(Rc::clone(&backend));
        let bus = EventBus::new();

        ReliefHub {
            resources: ResourceRepository::new(store.clone(), bus.clone(), Rc::clone(&stamp)),
            responses: ResponseRepository::new(store.clone(), bus.clone(), stamp),
            views: DerivedViews::new(store.clone()),
            sync: CrossTabSync::new(backend, bus.clone()),
            store,
            bus,
            auto_assign: self.auto_assign,
        }
    }
}

impl fmt::Debug for ReliefHubBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReliefHubBuilder")
            .field("has_backend", &self.backend.is_some())
            .field("has_clock", &self.clock.is_some())
            .field("auto_assign", &self.auto_assign)
            .finish()
    }
}
