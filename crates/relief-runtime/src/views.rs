//! Derived views over resources and responses.
//!
//! Everything here is recomputed from the stored collections on each call;
//! nothing is cached or persisted. Surfaces subscribe to the bus and call
//! back into these functions when a change arrives.
//!
//! The free functions work on collections the caller already holds.
//! [`DerivedViews`] reads them from the store first.

use std::collections::HashMap;

use relief_core::{
    Category, Resource, ResourceKind, ResourceStatus, Response, StoreKey, UserRole,
};
use relief_store::CollectionStore;
use tracing::debug_span;

/// Display identity for a user id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    pub name: String,
    pub role: UserRole,
}

impl UserProfile {
    #[must_use]
    pub fn new(name: impl Into<String>, role: UserRole) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }
}

/// Source of display identities. User records are stored outside this core.
pub trait UserDirectory {
    fn profile(&self, user_id: &str) -> Option<UserProfile>;
}

impl UserDirectory for HashMap<String, UserProfile> {
    fn profile(&self, user_id: &str) -> Option<UserProfile> {
        self.get(user_id).cloned()
    }
}

/// Who answered a resource first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponderInfo {
    pub user_id: String,
    /// The directory name, or the user id when the directory has no entry.
    pub name: String,
    pub role: Option<UserRole>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceFilter {
    pub kind: Option<ResourceKind>,
    pub category: Option<Category>,
    pub status: Option<ResourceStatus>,
    pub search_text: Option<String>,
}

impl ResourceFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn kind(mut self, kind: ResourceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn status(mut self, status: ResourceStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search_text = Some(text.into());
        self
    }

    #[must_use]
    pub fn matches(&self, r: &Resource) -> bool {
        self.kind.is_none_or(|k| r.kind == k)
            && self.category.is_none_or(|c| r.category == c)
            && self.status.is_none_or(|s| r.status == s)
            && self
                .search_text
                .as_deref()
                .is_none_or(|text| r.matches_text(text))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub addressing: usize,
    pub resolved: usize,
    pub total: usize,
}

#[must_use]
pub fn status_counts(resources: &[Resource]) -> StatusCounts {
    resources
        .iter()
        .fold(StatusCounts::default(), |mut counts, r| {
            match r.status {
                ResourceStatus::Pending => counts.pending += 1,
                ResourceStatus::Addressing => counts.addressing += 1,
                ResourceStatus::Resolved => counts.resolved += 1,
            }
            counts.total += 1;
            counts
        })
}

/// Resources matching `filter`, urgent first, then newest first.
#[must_use]
pub fn sorted_filtered(resources: &[Resource], filter: &ResourceFilter) -> Vec<Resource> {
    let mut out: Vec<Resource> = resources
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect();
    out.sort_by(|a, b| {
        b.urgent
            .cmp(&a.urgent)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });
    out
}

/// Whether a user in `role` may act on `resource`: needs are answered by
/// anyone but victims, offers are claimed only by victims.
#[must_use]
pub fn actionable_by(resource: &Resource, role: UserRole) -> bool {
    match resource.kind {
        ResourceKind::Need => role != UserRole::Victim,
        ResourceKind::Offer => role == UserRole::Victim,
    }
}

#[must_use]
pub fn resources_by_owner(resources: &[Resource], user_id: &str) -> Vec<Resource> {
    resources
        .iter()
        .filter(|r| r.user_id == user_id)
        .cloned()
        .collect()
}

/// Store-backed view computer.
#[derive(Clone, Debug)]
pub struct DerivedViews {
    store: CollectionStore,
}

impl DerivedViews {
    #[must_use]
    pub fn new(store: CollectionStore) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn resources(&self) -> Vec<Resource> {
        self.store.read(&StoreKey::Resources)
    }

    /// Whether `user_id` has already acted on `request_id`, per their index.
    #[must_use]
    pub fn has_responded(&self, user_id: &str, request_id: &str) -> bool {
        let index: Vec<String> = self.store.read(&StoreKey::responded_requests(user_id));
        index.iter().any(|id| id == request_id)
    }

    /// The earliest response filed against `request_id`, resolved to a
    /// display identity.
    #[must_use]
    pub fn responder_for(
        &self,
        request_id: &str,
        directory: &dyn UserDirectory,
    ) -> Option<ResponderInfo> {
        let first = self
            .responses_for_resource(request_id)
            .into_iter()
            .next()?;
        let profile = directory.profile(&first.responder_id);
        Some(ResponderInfo {
            name: profile
                .as_ref()
                .map_or_else(|| first.responder_id.clone(), |p| p.name.clone()),
            role: profile.map(|p| p.role),
            user_id: first.responder_id,
        })
    }

    /// Every stored response, grouped by responder id.
    #[must_use]
    pub fn all_responses(&self) -> Vec<Response> {
        self.store
            .keys()
            .iter()
            .filter(|key| matches!(key, StoreKey::Responses(_)))
            .flat_map(|key| self.store.read::<Response>(key))
            .collect()
    }

    /// Responses filed against one resource, oldest first.
    #[must_use]
    pub fn responses_for_resource(&self, request_id: &str) -> Vec<Response> {
        let _span = debug_span!("responses_for_resource", request_id).entered();
        let mut out: Vec<Response> = self
            .all_responses()
            .into_iter()
            .filter(|r| r.request_id == request_id)
            .collect();
        out.sort_by_key(|r| r.time);
        out
    }

    #[must_use]
    pub fn responses_for_user(&self, user_id: &str) -> Vec<Response> {
        self.store.read(&StoreKey::responses(user_id))
    }

    /// The user's active response to `request_id`, if any.
    #[must_use]
    pub fn active_response(&self, user_id: &str, request_id: &str) -> Option<Response> {
        self.responses_for_user(user_id)
            .into_iter()
            .find(|r| r.request_id == request_id && r.is_active())
    }

    #[must_use]
    pub fn status_counts(&self) -> StatusCounts {
        status_counts(&self.resources())
    }

    #[must_use]
    pub fn list(&self, filter: &ResourceFilter) -> Vec<Resource> {
        sorted_filtered(&self.resources(), filter)
    }

    /// Resources a user in `role` may act on and has not acted on yet.
    #[must_use]
    pub fn open_for(&self, user_id: &str, role: UserRole, filter: &ResourceFilter) -> Vec<Resource> {
        let index: Vec<String> = self.store.read(&StoreKey::responded_requests(user_id));
        self.list(filter)
            .into_iter()
            .filter(|r| actionable_by(r, role) && !index.contains(&r.id))
            .collect()
    }
}
