#![forbid(unsafe_code)]

//! End-to-end scenarios through the public facade.

use std::collections::HashSet;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use relief::prelude::*;
use relief::{StatusCounts, StoreKey};
use relief_harness::fixtures::{
    directory, medical_need, ngo, response, shelter_need, victim, volunteer, water_offer,
};
use relief_harness::strategies::arb_new_resource;
use relief_harness::{EventRecorder, START, TestHub};

// ============================================================================
// Resources
// ============================================================================

#[test]
fn create_then_get_returns_same_record() {
    let hub = TestHub::new();
    let created = hub.resources().create(shelter_need("victim-1")).unwrap();

    assert_eq!(created.status, ResourceStatus::Pending);
    assert_eq!(created.timestamp, START);
    assert_eq!(created.version, 1);
    assert_eq!(hub.resources().get_by_id(&created.id), Some(created));
}

#[test]
fn each_write_publishes_exactly_once() {
    let hub = TestHub::new();
    let rec = EventRecorder::attach(hub.bus());

    let need = hub.resources().create(shelter_need("victim-1")).unwrap();
    assert_eq!(rec.take(), vec![ChangeKind::ResourceCreated]);

    hub.resources()
        .update(&need.id, ResourcePatch::new().urgent(true))
        .unwrap();
    assert_eq!(rec.take(), vec![ChangeKind::ResourceUpdated]);

    hub.responses()
        .create(&need.id, "vol-1", relief::ResponseKind::Offer, need.category, &need.title)
        .unwrap();
    assert_eq!(rec.take(), vec![ChangeKind::ResponseCreated]);
}

#[test]
fn invalid_create_writes_nothing() {
    let hub = TestHub::new();
    let rec = EventRecorder::attach(hub.bus());
    let before = hub.store_digest();

    let mut input = shelter_need("victim-1");
    input.title = "   ".into();
    let err = hub.resources().create(input).unwrap_err();

    assert!(matches!(err, ReliefError::Validation { .. }));
    assert_eq!(hub.store_digest(), before);
    assert!(rec.is_empty());
}

#[test]
fn assigning_shifts_status_counts() {
    let hub = TestHub::new();
    let need = hub.resources().create(shelter_need("victim-1")).unwrap();
    hub.resources().create(water_offer("ngo-1")).unwrap();
    assert_eq!(
        hub.views().status_counts(),
        StatusCounts {
            pending: 2,
            addressing: 0,
            resolved: 0,
            total: 2,
        }
    );

    let assigned = hub.resources().assign(&need.id, "Team X").unwrap();
    assert_eq!(assigned.assigned_to.as_deref(), Some("Team X"));
    assert_eq!(
        hub.views().status_counts(),
        StatusCounts {
            pending: 1,
            addressing: 1,
            resolved: 0,
            total: 2,
        }
    );
}

#[test]
fn status_machine_rejects_skips_and_regressions() {
    let hub = TestHub::new();
    let need = hub.resources().create(shelter_need("victim-1")).unwrap();

    let err = hub.resources().complete(&need.id).unwrap_err();
    assert!(matches!(err, ReliefError::IllegalTransition { .. }));

    hub.resources().assign(&need.id, "Team X").unwrap();
    hub.resources().complete(&need.id).unwrap();
    let err = hub
        .resources()
        .update(&need.id, ResourcePatch::new().status(ResourceStatus::Pending))
        .unwrap_err();
    assert!(matches!(err, ReliefError::IllegalTransition { .. }));

    let reopened = hub.resources().reopen(&need.id).unwrap();
    assert_eq!(reopened.status, ResourceStatus::Addressing);
}

#[test]
fn stale_version_is_a_conflict() {
    let hub = TestHub::new();
    let need = hub.resources().create(shelter_need("victim-1")).unwrap();
    hub.resources()
        .update(&need.id, ResourcePatch::new().people(6).expecting_version(1))
        .unwrap();

    let err = hub
        .resources()
        .update(&need.id, ResourcePatch::new().people(7).expecting_version(1))
        .unwrap_err();
    assert!(matches!(
        err,
        ReliefError::Conflict {
            expected: 1,
            actual: 2,
            ..
        }
    ));
    assert_eq!(hub.resources().get_by_id(&need.id).unwrap().people, Some(6));
}

#[test]
fn unreadable_collection_reads_as_empty() {
    let hub = TestHub::new();
    hub.force_write_raw("resources", "{not json");

    assert!(hub.views().resources().is_empty());
    assert_eq!(hub.views().status_counts().total, 0);

    let created = hub.resources().create(shelter_need("victim-1")).unwrap();
    assert_eq!(hub.resources().all(), vec![created]);
}

// ============================================================================
// Responses
// ============================================================================

#[test]
fn double_request_yields_one_response() {
    let hub = TestHub::new();
    let offer = hub.resources().create(water_offer("ngo-1")).unwrap();
    let claimant = victim("victim-1", "Amina");

    let first = hub.respond(&offer.id, &claimant).unwrap();
    hub.advance(1_000);
    let second = hub.respond(&offer.id, &claimant).unwrap();

    assert!(first.is_created());
    assert!(!second.is_created());
    assert_eq!(first.clone().into_inner(), second.into_inner());

    let stored = hub.responses().responses_of("victim-1");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, relief::ResponseKind::Request);
    assert_eq!(
        hub.store().read::<String>(&StoreKey::responded_requests("victim-1")),
        vec![offer.id.clone()]
    );
}

#[test]
fn repeated_response_leaves_store_untouched() {
    let hub = TestHub::new();
    let need = hub.resources().create(medical_need("victim-1")).unwrap();
    let responder = ngo("ngo-1", "Harbour NGO");
    hub.respond(&need.id, &responder).unwrap();

    let rec = EventRecorder::attach(hub.bus());
    let before = hub.store_digest();
    for _ in 0..3 {
        hub.respond(&need.id, &responder).unwrap();
    }
    assert_eq!(hub.store_digest(), before);
    assert!(rec.is_empty());
}

#[test]
fn first_response_assigns_and_names_responder() {
    let hub = TestHub::new();
    let need = hub.resources().create(shelter_need("victim-1")).unwrap();
    hub.respond(&need.id, &volunteer("vol-1", "Team X")).unwrap();
    hub.advance(10);
    hub.respond(&need.id, &ngo("ngo-1", "Harbour NGO")).unwrap();

    let resource = hub.resources().get_by_id(&need.id).unwrap();
    assert_eq!(resource.status, ResourceStatus::Addressing);
    assert_eq!(resource.assigned_to.as_deref(), Some("Team X"));

    let dir = directory(&[("vol-1", "Team X", UserRole::Volunteer)]);
    let info = hub.views().responder_for(&need.id, &dir).unwrap();
    assert_eq!(info.user_id, "vol-1");
    assert_eq!(info.name, "Team X");
}

#[test]
fn response_lifecycle_reaches_every_state() {
    let hub = TestHub::new();
    let a = hub.resources().create(shelter_need("victim-1")).unwrap();
    let b = hub.resources().create(medical_need("victim-2")).unwrap();
    let r1 = hub.respond(&a.id, &volunteer("vol-1", "Team X")).unwrap().into_inner();
    let r2 = hub.respond(&b.id, &volunteer("vol-1", "Team X")).unwrap().into_inner();

    let accepted = hub.responses().accept(&r1.id, "vol-1").unwrap();
    assert_eq!(accepted.status, ResponseStatus::Accepted);
    let completed = hub.responses().complete(&r1.id, "vol-1").unwrap();
    assert_eq!(completed.status, ResponseStatus::Completed);
    assert_eq!(completed.version, 3);

    let rejected = hub.responses().reject(&r2.id, "vol-1").unwrap();
    assert_eq!(rejected.status, ResponseStatus::Rejected);
    assert!(hub.views().active_response("vol-1", &b.id).is_none());

    let err = hub.responses().accept(&r2.id, "vol-1").unwrap_err();
    assert!(matches!(err, ReliefError::IllegalTransition { .. }));
}

#[test]
fn cleanup_keeps_earliest_duplicate() {
    let hub = TestHub::new();
    let need = hub.resources().create(shelter_need("victim-1")).unwrap();
    hub.force_insert_responses(
        "vol-1",
        &[
            response("late", &need.id, "vol-1", START + 300),
            response("first", &need.id, "vol-1", START + 100),
            response("middle", &need.id, "vol-1", START + 200),
        ],
    );

    let report = hub.cleanup().unwrap();
    assert_eq!(report.duplicates_collapsed, 2);
    let kept = hub.responses().responses_of("vol-1");
    assert_eq!(kept.len(), 1, "{}", hub.dump(&StoreKey::responses("vol-1")));
    assert_eq!(kept[0].id, "first");
}

#[test]
fn cleanup_removes_orphan_and_duplicate() {
    let hub = TestHub::new();
    let need = hub.resources().create(shelter_need("victim-1")).unwrap();
    let rec = EventRecorder::attach(hub.bus());
    hub.force_insert_responses(
        "vol-1",
        &[
            response("a", &need.id, "vol-1", START + 1),
            response("b", &need.id, "vol-1", START + 2),
            response("ghost", "deleted-resource", "vol-1", START + 3),
        ],
    );

    let report = hub.cleanup().unwrap();
    assert_eq!(report.orphans_removed, 1);
    assert_eq!(report.duplicates_collapsed, 1);
    assert_eq!(report.users_repaired, 1);
    assert_eq!(rec.take(), vec![ChangeKind::ResponseUpdated]);

    assert_eq!(
        hub.store().read::<String>(&StoreKey::responded_requests("vol-1")),
        vec![need.id.clone()]
    );

    let again = hub.cleanup().unwrap();
    assert!(again.is_clean());
    assert!(rec.is_empty());
}

#[test]
fn deleting_a_resource_orphans_its_responses() {
    let hub = TestHub::new();
    let need = hub.resources().create(shelter_need("victim-1")).unwrap();
    hub.respond(&need.id, &volunteer("vol-1", "Team X")).unwrap();
    hub.resources().delete(&need.id).unwrap();

    assert_eq!(hub.cleanup().unwrap().orphans_removed, 1);
    assert!(hub.responses().responses_of("vol-1").is_empty());
    assert!(!hub.views().has_responded("vol-1", &need.id));
}

// ============================================================================
// Views
// ============================================================================

#[test]
fn open_for_hides_answered_and_foreign_kinds() {
    let hub = TestHub::new();
    let shelter = hub.resources().create(shelter_need("victim-1")).unwrap();
    let medical = hub.resources().create(medical_need("victim-2")).unwrap();
    hub.resources().create(water_offer("ngo-1")).unwrap();

    hub.respond(&shelter.id, &volunteer("vol-1", "Team X")).unwrap();
    let open: Vec<String> = hub
        .views()
        .open_for("vol-1", UserRole::Volunteer, &ResourceFilter::new())
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(open, vec![medical.id]);
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn one_response_per_pair(
        inputs in proptest::collection::vec(arb_new_resource(), 1..6),
        picks in proptest::collection::vec((0usize..6, 0usize..3), 1..24),
    ) {
        let hub = TestHub::new();
        let ids: Vec<String> = inputs
            .into_iter()
            .map(|input| hub.resources().create(input).unwrap().id)
            .collect();
        let responders = ["u0", "u1", "u2"];

        for (resource, who) in picks {
            let id = &ids[resource % ids.len()];
            let kind = hub.resources().get_by_id(id).unwrap().kind;
            let role = match kind {
                ResourceKind::Need => UserRole::Volunteer,
                ResourceKind::Offer => UserRole::Victim,
            };
            hub.respond(id, &Responder::new(responders[who], responders[who], role)).unwrap();
            hub.advance(1);
        }

        for user in responders {
            let stored = hub.responses().responses_of(user);
            let distinct: HashSet<&str> = stored.iter().map(|r| r.request_id.as_str()).collect();
            prop_assert_eq!(distinct.len(), stored.len());

            let index: Vec<String> = hub.store().read(&StoreKey::responded_requests(user));
            let expected: Vec<String> = stored.iter().map(|r| r.request_id.clone()).collect();
            prop_assert_eq!(index, expected);
        }
        prop_assert!(hub.cleanup().unwrap().is_clean());
    }
}
