//! Response repository: deduplicated creation, status changes, and repair.
//!
//! # Storage
//!
//! Each responder owns two keys: `responses_{user}` (the records) and
//! `responded_requests_{user}` (the ids of resources they acted on). The
//! record list is authoritative. The id index is a projection of it that is
//! recomputed and committed in the same batch on every write path, so the two
//! cannot drift through this API.
//!
//! # Invariants
//!
//! 1. At most one response per `(request_id, responder_id)` is created
//!    through [`ResponseRepository::create`]; repeated calls return the first.
//! 2. After any write, the index equals the distinct request ids of the
//!    stored records, in record order.
//! 3. [`ResponseRepository::cleanup_invalid_responses`] is idempotent.
//!
//! # Known limitation
//!
//! Two processes that both read an empty index for the same pair before
//! either writes will each create a response. Cleanup collapses such pairs to
//! the earliest record and logs every collapse at `warn` so the race is
//! visible to operators.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use relief_core::{
    Category, ChangeKind, ReliefError, ReliefResult, Resource, Response, ResponseKind,
    ResponseStatus, StoreKey,
};
use relief_store::{CollectionBatch, CollectionStore};
use tracing::{debug, debug_span, info, warn};
use uuid::Uuid;

use crate::bus::EventBus;
use crate::clock::MonotonicStamp;

/// Result of [`ResponseRepository::create_outcome`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseOutcome {
    Created(Response),
    /// The responder had already acted on the resource.
    Existing(Response),
}

impl ResponseOutcome {
    #[must_use]
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    #[must_use]
    pub fn into_inner(self) -> Response {
        match self {
            Self::Created(r) | Self::Existing(r) => r,
        }
    }
}

/// Summary of one cleanup pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub orphans_removed: usize,
    pub duplicates_collapsed: usize,
    /// Users whose collections were rewritten.
    pub users_repaired: usize,
}

impl CleanupReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Clone, Debug)]
pub struct ResponseRepository {
    store: CollectionStore,
    bus: EventBus,
    stamp: Rc<MonotonicStamp>,
}

impl ResponseRepository {
    #[must_use]
    pub fn new(store: CollectionStore, bus: EventBus, stamp: Rc<MonotonicStamp>) -> Self {
        Self { store, bus, stamp }
    }

    /// Record that `responder_id` acted on `request_id`.
    ///
    /// Returns the existing response unchanged if the responder already acted
    /// on this resource.
    pub fn create(
        &self,
        request_id: &str,
        responder_id: &str,
        kind: ResponseKind,
        category: Category,
        title: &str,
    ) -> ReliefResult<Response> {
        self.create_outcome(request_id, responder_id, kind, category, title)
            .map(ResponseOutcome::into_inner)
    }

    /// Like [`create`](Self::create), but reports whether a record was
    /// written.
    ///
    /// # Errors
    ///
    /// - [`ReliefError::Validation`] for a blank responder id or a `kind`
    ///   that is not the inverse of the resource's kind.
    /// - [`ReliefError::NotFound`] when `request_id` names no resource.
    pub fn create_outcome(
        &self,
        request_id: &str,
        responder_id: &str,
        kind: ResponseKind,
        category: Category,
        title: &str,
    ) -> ReliefResult<ResponseOutcome> {
        let _span = debug_span!("response_create", request_id, responder_id).entered();
        if responder_id.trim().is_empty() {
            return Err(ReliefError::validation("responderId must not be empty"));
        }

        let index: Vec<String> = self.store.read(&StoreKey::responded_requests(responder_id));
        let mut responses = self.responses_of(responder_id);

        if let Some(existing) = first_for_request(&responses, request_id) {
            let existing = existing.clone();
            if !index.iter().any(|id| id == request_id) {
                warn!(responder_id, request_id, "index was missing a recorded response; repairing");
                self.commit_user(responder_id, &responses)?;
            }
            debug!(id = %existing.id, "response already recorded");
            return Ok(ResponseOutcome::Existing(existing));
        }
        if index.iter().any(|id| id == request_id) {
            warn!(responder_id, request_id, "index listed a request with no response; recreating");
        }

        let resources: Vec<Resource> = self.store.read(&StoreKey::Resources);
        let resource = resources
            .iter()
            .find(|r| r.id == request_id)
            .ok_or_else(|| ReliefError::not_found("resource", request_id))?;
        let expected = resource.kind.response_kind();
        if kind != expected {
            return Err(ReliefError::validation(format!(
                "a {} must be answered with a {expected}, not a {kind}",
                resource.kind
            )));
        }

        let response = Response {
            id: Uuid::new_v4().to_string(),
            request_id: request_id.to_owned(),
            responder_id: responder_id.to_owned(),
            kind,
            category,
            title: title.to_owned(),
            time: self.stamp.next(),
            status: ResponseStatus::Pending,
            version: 1,
        };
        responses.push(response.clone());
        self.commit_user(responder_id, &responses)?;
        debug!(id = %response.id, "response created");

        self.bus.publish(ChangeKind::ResponseCreated);
        Ok(ResponseOutcome::Created(response))
    }

    /// Move a response to `new_status`.
    ///
    /// # Errors
    ///
    /// [`ReliefError::NotFound`] for an unknown response,
    /// [`ReliefError::IllegalTransition`] for a move the status machine does
    /// not allow.
    pub fn update_status(
        &self,
        response_id: &str,
        responder_id: &str,
        new_status: ResponseStatus,
    ) -> ReliefResult<Response> {
        self.update_status_checked(response_id, responder_id, new_status, None)
    }

    /// [`update_status`](Self::update_status) that also fails with
    /// [`ReliefError::Conflict`] if the record moved past `expected_version`.
    pub fn update_status_checked(
        &self,
        response_id: &str,
        responder_id: &str,
        new_status: ResponseStatus,
        expected_version: Option<u64>,
    ) -> ReliefResult<Response> {
        let _span = debug_span!("response_update", response_id, responder_id).entered();
        let mut responses = self.responses_of(responder_id);
        let response = responses
            .iter_mut()
            .find(|r| r.id == response_id)
            .ok_or_else(|| ReliefError::not_found("response", response_id))?;
        let from = response.status;
        response.transition(new_status, expected_version)?;
        let updated = response.clone();

        self.commit_user(responder_id, &responses)?;
        info!(response_id, from = %from, to = %new_status, "response status changed");

        self.bus.publish(ChangeKind::ResponseUpdated);
        Ok(updated)
    }

    pub fn accept(&self, response_id: &str, responder_id: &str) -> ReliefResult<Response> {
        self.update_status(response_id, responder_id, ResponseStatus::Accepted)
    }

    pub fn reject(&self, response_id: &str, responder_id: &str) -> ReliefResult<Response> {
        self.update_status(response_id, responder_id, ResponseStatus::Rejected)
    }

    pub fn complete(&self, response_id: &str, responder_id: &str) -> ReliefResult<Response> {
        self.update_status(response_id, responder_id, ResponseStatus::Completed)
    }

    /// Every response owned by `responder_id`, in creation order.
    #[must_use]
    pub fn responses_of(&self, responder_id: &str) -> Vec<Response> {
        self.store.read(&StoreKey::responses(responder_id))
    }

    /// Remove orphans, collapse duplicate pairs to the earliest record, and
    /// rewrite every index to match the survivors.
    ///
    /// Publishes [`ChangeKind::ResponseUpdated`] once if anything changed.
    ///
    /// # Errors
    ///
    /// Fails with [`ReliefError::Storage`] without touching anything when the
    /// resource collection is present but unreadable. A user whose own
    /// response collection is unreadable is skipped and left as is.
    pub fn cleanup_invalid_responses(&self) -> ReliefResult<CleanupReport> {
        let _span = debug_span!("response_cleanup").entered();
        let resources: Vec<Resource> = self
            .store
            .try_read(&StoreKey::Resources)
            .inspect_err(|err| warn!(error = %err, "resources unreadable; cleanup aborted"))?
            .unwrap_or_default();
        let live: HashSet<&str> = resources.iter().map(|r| r.id.as_str()).collect();

        let mut report = CleanupReport::default();
        for user in self.store.responder_ids() {
            let responses: Vec<Response> = match self.store.try_read(&StoreKey::responses(&user)) {
                Ok(responses) => responses.unwrap_or_default(),
                Err(err) => {
                    warn!(user = %user, error = %err, "responses unreadable; user skipped");
                    continue;
                }
            };
            let index: Vec<String> = self.store.read(&StoreKey::responded_requests(&user));

            let before = responses.len();
            let mut survivors: Vec<Response> = responses
                .iter()
                .filter(|r| live.contains(r.request_id.as_str()))
                .cloned()
                .collect();
            let orphans = before - survivors.len();

            let keep = earliest_per_request(&survivors);
            let kept_before = survivors.len();
            survivors = survivors
                .into_iter()
                .enumerate()
                .filter(|(pos, _)| keep.contains(pos))
                .map(|(_, r)| r)
                .collect();
            let duplicates = kept_before - survivors.len();

            if duplicates > 0 {
                warn!(
                    user = %user,
                    duplicates,
                    "collapsed duplicate responses; concurrent writers raced on the same pair"
                );
            }
            if orphans > 0 {
                debug!(user = %user, orphans, "removed orphaned responses");
            }

            let changed = orphans > 0 || duplicates > 0 || index != index_of(&survivors);
            if changed {
                self.commit_user(&user, &survivors)?;
                report.users_repaired += 1;
            }
            report.orphans_removed += orphans;
            report.duplicates_collapsed += duplicates;
        }

        if report.is_clean() {
            debug!("response collections already consistent");
        } else {
            info!(
                orphans = report.orphans_removed,
                duplicates = report.duplicates_collapsed,
                users = report.users_repaired,
                "response cleanup finished"
            );
            self.bus.publish(ChangeKind::ResponseUpdated);
        }
        Ok(report)
    }

    /// Persist a user's records and their recomputed index in one batch.
    fn commit_user(&self, responder_id: &str, responses: &[Response]) -> ReliefResult<()> {
        let mut batch = CollectionBatch::new();
        batch.put(&StoreKey::responses(responder_id), responses)?;
        batch.put(
            &StoreKey::responded_requests(responder_id),
            &index_of(responses),
        )?;
        self.store.commit(batch)?;
        Ok(())
    }
}

/// Distinct request ids in record order.
fn index_of(responses: &[Response]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    responses
        .iter()
        .filter(|r| seen.insert(r.request_id.as_str()))
        .map(|r| r.request_id.clone())
        .collect()
}

/// The response a repeated create should return: the earliest active one,
/// else the earliest of any status.
fn first_for_request<'a>(responses: &'a [Response], request_id: &str) -> Option<&'a Response> {
    let matching = move || responses.iter().filter(move |r| r.request_id == request_id);
    matching()
        .filter(|r| r.is_active())
        .min_by_key(|r| r.time)
        .or_else(|| matching().min_by_key(|r| r.time))
}

/// Positions to keep: per request id, the smallest `time`, ties going to the
/// earlier position.
fn earliest_per_request(responses: &[Response]) -> HashSet<usize> {
    let mut best: HashMap<&str, usize> = HashMap::new();
    for (pos, r) in responses.iter().enumerate() {
        best.entry(r.request_id.as_str())
            .and_modify(|cur| {
                if r.time < responses[*cur].time {
                    *cur = pos;
                }
            })
            .or_insert(pos);
    }
    best.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::resources::ResourceRepository;
    use pretty_assertions::assert_eq;
    use relief_core::{NewResource, ResourceKind};
    use relief_store::{KeyValueStore, MemoryStore};
    use std::cell::Cell;
    use tracing_test::traced_test;

    struct Fixture {
        store: CollectionStore,
        bus: EventBus,
        resources: ResourceRepository,
        responses: ResponseRepository,
    }

    fn fixture() -> Fixture {
        let store = CollectionStore::new(Rc::new(MemoryStore::new()));
        let bus = EventBus::new();
        let stamp = Rc::new(MonotonicStamp::new(Box::new(ManualClock::new(5_000))));
        Fixture {
            resources: ResourceRepository::new(store.clone(), bus.clone(), Rc::clone(&stamp)),
            responses: ResponseRepository::new(store.clone(), bus.clone(), stamp),
            store,
            bus,
        }
    }

    fn need(f: &Fixture) -> Resource {
        f.resources
            .create(NewResource::new(
                ResourceKind::Need,
                Category::Medical,
                "Insulin",
                "Two pens needed",
                "Shelter B",
                "u-victim",
                "Sam",
            ))
            .unwrap()
    }

    fn raw(id: &str, request_id: &str, responder: &str, time: u64) -> Response {
        Response {
            id: id.into(),
            request_id: request_id.into(),
            responder_id: responder.into(),
            kind: ResponseKind::Offer,
            category: Category::Medical,
            title: "Insulin".into(),
            time,
            status: ResponseStatus::Pending,
            version: 1,
        }
    }

    #[test]
    fn create_is_idempotent() {
        let f = fixture();
        let r = need(&f);
        let created = Rc::new(Cell::new(0));
        let c = Rc::clone(&created);
        let _sub = f.bus.subscribe(ChangeKind::ResponseCreated, move || c.set(c.get() + 1));

        let first = f
            .responses
            .create_outcome(&r.id, "u-vol", ResponseKind::Offer, r.category, &r.title)
            .unwrap();
        let second = f
            .responses
            .create_outcome(&r.id, "u-vol", ResponseKind::Offer, r.category, &r.title)
            .unwrap();

        assert!(first.is_created());
        assert!(!second.is_created());
        assert_eq!(first.into_inner(), second.into_inner());
        assert_eq!(f.responses.responses_of("u-vol").len(), 1);
        let index: Vec<String> = f.store.read(&StoreKey::responded_requests("u-vol"));
        assert_eq!(index, vec![r.id.clone()]);
        assert_eq!(created.get(), 1);
    }

    #[test]
    fn unknown_resource_is_rejected() {
        let f = fixture();
        let err = f
            .responses
            .create("ghost", "u-vol", ResponseKind::Offer, Category::Food, "x")
            .unwrap_err();
        assert!(matches!(err, ReliefError::NotFound { .. }));
        assert!(f.responses.responses_of("u-vol").is_empty());
    }

    #[test]
    fn kind_must_invert_resource_kind() {
        let f = fixture();
        let r = need(&f);
        let err = f
            .responses
            .create(&r.id, "u-vol", ResponseKind::Request, r.category, &r.title)
            .unwrap_err();
        assert!(matches!(err, ReliefError::Validation { .. }));
    }

    #[test]
    fn missing_index_entry_is_repaired_on_create() {
        let f = fixture();
        let r = need(&f);
        f.store
            .write(&StoreKey::responses("u-vol"), &[raw("x1", &r.id, "u-vol", 1)])
            .unwrap();

        let got = f
            .responses
            .create(&r.id, "u-vol", ResponseKind::Offer, r.category, &r.title)
            .unwrap();
        assert_eq!(got.id, "x1");
        let index: Vec<String> = f.store.read(&StoreKey::responded_requests("u-vol"));
        assert_eq!(index, vec![r.id]);
    }

    #[test]
    fn stale_index_entry_does_not_block_create() {
        let f = fixture();
        let r = need(&f);
        f.store
            .write(&StoreKey::responded_requests("u-vol"), &[r.id.clone()])
            .unwrap();
        let outcome = f
            .responses
            .create_outcome(&r.id, "u-vol", ResponseKind::Offer, r.category, &r.title)
            .unwrap();
        assert!(outcome.is_created());
    }

    #[test]
    fn status_walks_and_publishes() {
        let f = fixture();
        let r = need(&f);
        let resp = f
            .responses
            .create(&r.id, "u-vol", ResponseKind::Offer, r.category, &r.title)
            .unwrap();
        let updates = Rc::new(Cell::new(0));
        let u = Rc::clone(&updates);
        let _sub = f.bus.subscribe(ChangeKind::ResponseUpdated, move || u.set(u.get() + 1));

        assert!(f.responses.complete(&resp.id, "u-vol").is_err());
        let resp = f.responses.accept(&resp.id, "u-vol").unwrap();
        assert_eq!(resp.status, ResponseStatus::Accepted);
        let resp = f.responses.complete(&resp.id, "u-vol").unwrap();
        assert_eq!(resp.status, ResponseStatus::Completed);
        assert!(f.responses.reject(&resp.id, "u-vol").is_err());
        assert_eq!(updates.get(), 2);
    }

    #[test]
    fn reject_from_pending() {
        let f = fixture();
        let r = need(&f);
        let resp = f
            .responses
            .create(&r.id, "u-vol", ResponseKind::Offer, r.category, &r.title)
            .unwrap();
        let resp = f.responses.reject(&resp.id, "u-vol").unwrap();
        assert_eq!(resp.status, ResponseStatus::Rejected);
        assert_eq!(f.responses.responses_of("u-vol")[0].status, ResponseStatus::Rejected);
    }

    #[test]
    fn update_status_checks_version() {
        let f = fixture();
        let r = need(&f);
        let resp = f
            .responses
            .create(&r.id, "u-vol", ResponseKind::Offer, r.category, &r.title)
            .unwrap();
        f.responses.accept(&resp.id, "u-vol").unwrap();
        let err = f
            .responses
            .update_status_checked(&resp.id, "u-vol", ResponseStatus::Completed, Some(1))
            .unwrap_err();
        assert!(matches!(err, ReliefError::Conflict { .. }));
    }

    #[test]
    fn update_unknown_response_is_not_found() {
        let f = fixture();
        let err = f.responses.accept("nope", "u-vol").unwrap_err();
        assert!(matches!(err, ReliefError::NotFound { .. }));
    }

    #[test]
    fn cleanup_removes_orphans_and_collapses_duplicates() {
        let f = fixture();
        let kept = need(&f);
        let doomed = need(&f);
        f.store
            .write(
                &StoreKey::responses("u-vol"),
                &[
                    raw("late", &kept.id, "u-vol", 20),
                    raw("orphan", &doomed.id, "u-vol", 15),
                    raw("early", &kept.id, "u-vol", 10),
                ],
            )
            .unwrap();
        f.store
            .write(
                &StoreKey::responded_requests("u-vol"),
                &[kept.id.clone(), doomed.id.clone(), "stray".to_owned()],
            )
            .unwrap();
        f.resources.delete(&doomed.id).unwrap();

        let report = f.responses.cleanup_invalid_responses().unwrap();
        assert_eq!(
            report,
            CleanupReport {
                orphans_removed: 1,
                duplicates_collapsed: 1,
                users_repaired: 1,
            }
        );
        let survivors = f.responses.responses_of("u-vol");
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].id, "early");
        let index: Vec<String> = f.store.read(&StoreKey::responded_requests("u-vol"));
        assert_eq!(index, vec![kept.id]);

        assert!(f.responses.cleanup_invalid_responses().unwrap().is_clean());
    }

    #[test]
    #[traced_test]
    fn collapsed_duplicates_are_logged() {
        let f = fixture();
        let r = need(&f);
        f.store
            .write(
                &StoreKey::responses("u-vol"),
                &[raw("a", &r.id, "u-vol", 1), raw("b", &r.id, "u-vol", 2)],
            )
            .unwrap();
        f.responses.cleanup_invalid_responses().unwrap();
        assert!(logs_contain("collapsed duplicate responses"));
    }

    #[test]
    fn cleanup_drops_index_without_records() {
        let f = fixture();
        f.store
            .write(&StoreKey::responded_requests("u-ghost"), &["r-1".to_owned()])
            .unwrap();
        let report = f.responses.cleanup_invalid_responses().unwrap();
        assert_eq!(report.users_repaired, 1);
        let index: Vec<String> = f.store.read(&StoreKey::responded_requests("u-ghost"));
        assert!(index.is_empty());
    }

    #[test]
    #[traced_test]
    fn unreadable_resources_abort_cleanup() {
        let f = fixture();
        let r = need(&f);
        f.responses
            .create_outcome(&r.id, "u-vol", ResponseKind::Offer, r.category, &r.title)
            .unwrap();
        let intact = f.store.backend().get("resources").unwrap().unwrap();
        let truncated = &intact[..intact.len() - 1];
        f.store.backend().set("resources", truncated).unwrap();

        let updates = Rc::new(Cell::new(0));
        let u = Rc::clone(&updates);
        let _sub = f.bus.subscribe(ChangeKind::ResponseUpdated, move || u.set(u.get() + 1));

        let err = f.responses.cleanup_invalid_responses().unwrap_err();
        assert!(matches!(err, ReliefError::Storage(_)));
        assert!(logs_contain("cleanup aborted"));
        assert_eq!(updates.get(), 0);

        f.store.backend().set("resources", &intact).unwrap();
        assert_eq!(f.responses.responses_of("u-vol").len(), 1);
        assert!(f.responses.cleanup_invalid_responses().unwrap().is_clean());
    }

    #[test]
    fn absent_resources_still_purge_orphans() {
        let f = fixture();
        f.store
            .write(&StoreKey::responses("u-vol"), &[raw("a", "gone", "u-vol", 1)])
            .unwrap();
        let report = f.responses.cleanup_invalid_responses().unwrap();
        assert_eq!(report.orphans_removed, 1);
        assert!(f.responses.responses_of("u-vol").is_empty());
    }

    #[test]
    fn unreadable_user_collection_is_skipped() {
        let f = fixture();
        let r = need(&f);
        f.store.backend().set("responses_u-bad", "[{").unwrap();
        f.store
            .write(&StoreKey::responses("u-ok"), &[raw("a", "gone", "u-ok", 1)])
            .unwrap();

        let report = f.responses.cleanup_invalid_responses().unwrap();
        assert_eq!(report.orphans_removed, 1);
        assert_eq!(report.users_repaired, 1);
        assert_eq!(
            f.store.backend().get("responses_u-bad").unwrap().as_deref(),
            Some("[{")
        );
        assert!(f.resources.get_by_id(&r.id).is_some());
    }

    #[test]
    fn duplicate_time_tie_keeps_first_position() {
        let rows = vec![raw("a", "r", "u", 7), raw("b", "r", "u", 7)];
        let keep = earliest_per_request(&rows);
        assert_eq!(keep, HashSet::from([0]));
    }

    #[test]
    fn index_preserves_record_order() {
        let rows = vec![raw("a", "r2", "u", 1), raw("b", "r1", "u", 2), raw("c", "r2", "u", 3)];
        assert_eq!(index_of(&rows), vec!["r2", "r1"]);
    }
}
