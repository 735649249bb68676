//! Resource repository: create, patch, and move resources through their
//! status machine.
//!
//! Every write is a read-modify-write of the whole `resources` collection
//! followed by exactly one [`ChangeKind`] publish. Listing and filtering
//! live in [`crate::views`].

use std::rc::Rc;

use relief_core::{
    ChangeKind, NewResource, ReliefError, ReliefResult, Resource, ResourcePatch, ResourceStatus,
    StoreKey,
};
use relief_store::CollectionStore;
use tracing::{debug, debug_span, info};
use uuid::Uuid;

use crate::bus::EventBus;
use crate::clock::MonotonicStamp;

#[derive(Clone, Debug)]
pub struct ResourceRepository {
    store: CollectionStore,
    bus: EventBus,
    stamp: Rc<MonotonicStamp>,
}

impl ResourceRepository {
    #[must_use]
    pub fn new(store: CollectionStore, bus: EventBus, stamp: Rc<MonotonicStamp>) -> Self {
        Self { store, bus, stamp }
    }

    /// Validate and persist a new `pending` resource, then publish
    /// [`ChangeKind::ResourceCreated`].
    ///
    /// # Errors
    ///
    /// [`ReliefError::Validation`] when a required field is blank; nothing is
    /// written in that case.
    pub fn create(&self, input: NewResource) -> ReliefResult<Resource> {
        let _span = debug_span!("resource_create", user = %input.user_id).entered();
        input.validate()?;

        let mut resources = self.all();
        let mut id = Uuid::new_v4().to_string();
        while resources.iter().any(|r| r.id == id) {
            id = Uuid::new_v4().to_string();
        }
        let resource = Resource::from_new(id, input, self.stamp.next())?;
        resources.push(resource.clone());
        self.store.write(&StoreKey::Resources, &resources)?;
        debug!(id = %resource.id, kind = %resource.kind, category = %resource.category, "resource created");

        self.bus.publish(ChangeKind::ResourceCreated);
        Ok(resource)
    }

    /// Merge `patch` into the stored resource, then publish
    /// [`ChangeKind::ResourceUpdated`].
    ///
    /// # Errors
    ///
    /// - [`ReliefError::NotFound`] for an unknown id.
    /// - [`ReliefError::IllegalTransition`] when `patch.status` is not an edge
    ///   of the status machine.
    /// - [`ReliefError::Conflict`] when `patch.expected_version` is stale.
    /// - [`ReliefError::Validation`] for blank fields or a missing assignee.
    pub fn update(&self, id: &str, patch: ResourcePatch) -> ReliefResult<Resource> {
        let _span = debug_span!("resource_update", id).entered();
        let mut resources = self.all();
        let resource = resources
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ReliefError::not_found("resource", id))?;
        let from = resource.status;
        resource.apply(patch)?;
        let updated = resource.clone();

        self.store.write(&StoreKey::Resources, &resources)?;
        if from != updated.status {
            info!(id, from = %from, to = %updated.status, "resource status changed");
        } else {
            debug!(id, version = updated.version, "resource updated");
        }

        self.bus.publish(ChangeKind::ResourceUpdated);
        Ok(updated)
    }

    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<Resource> {
        self.all().into_iter().find(|r| r.id == id)
    }

    /// The whole collection, in stored (creation) order.
    #[must_use]
    pub fn all(&self) -> Vec<Resource> {
        self.store.read(&StoreKey::Resources)
    }

    /// `pending → addressing`, recording who picked it up.
    pub fn assign(&self, id: &str, assignee: &str) -> ReliefResult<Resource> {
        self.update(
            id,
            ResourcePatch::new()
                .status(ResourceStatus::Addressing)
                .assigned_to(assignee),
        )
    }

    /// `addressing → resolved`.
    pub fn complete(&self, id: &str) -> ReliefResult<Resource> {
        self.update(id, ResourcePatch::new().status(ResourceStatus::Resolved))
    }

    /// `resolved → addressing`.
    pub fn reopen(&self, id: &str) -> ReliefResult<Resource> {
        self.update(id, ResourcePatch::new().status(ResourceStatus::Addressing))
    }

    /// Hard-delete a resource. Maintenance only: responses pointing at it
    /// become orphans until the next cleanup.
    pub fn delete(&self, id: &str) -> ReliefResult<Resource> {
        let mut resources = self.all();
        let pos = resources
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| ReliefError::not_found("resource", id))?;
        let removed = resources.remove(pos);
        self.store.write(&StoreKey::Resources, &resources)?;
        info!(id, "resource deleted");

        self.bus.publish(ChangeKind::ResourceUpdated);
        Ok(removed)
    }
}
