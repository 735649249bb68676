//! Canned inputs shared by integration tests.

use std::collections::HashMap;

use relief_core::{
    Category, Millis, NewResource, ResourceKind, Response, ResponseKind, ResponseStatus, UserRole,
};
use relief_runtime::{Responder, UserProfile};

#[must_use]
pub fn water_offer(user_id: &str) -> NewResource {
    NewResource::new(
        ResourceKind::Offer,
        Category::Water,
        "Bottled water",
        "Two pallets of 1.5 L bottles",
        "Depot 4, Harbour Road",
        user_id,
        "Harbour NGO",
    )
    .item("1.5 L bottle", 480)
    .contact("Dispatch", "+1 555 0100")
}

#[must_use]
pub fn shelter_need(user_id: &str) -> NewResource {
    NewResource::new(
        ResourceKind::Need,
        Category::Shelter,
        "Tent for family",
        "Family of five lost their roof",
        "North Camp",
        user_id,
        "Amina",
    )
    .people(5)
    .location_details("Row C, next to the water tank")
}

#[must_use]
pub fn medical_need(user_id: &str) -> NewResource {
    NewResource::new(
        ResourceKind::Need,
        Category::Medical,
        "Insulin",
        "Two pens, refrigerated",
        "Shelter 3",
        user_id,
        "Omar",
    )
    .urgent(true)
    .special_notes("Patient is diabetic, supply runs out tomorrow")
}

#[must_use]
pub fn volunteer(user_id: &str, name: &str) -> Responder {
    Responder::new(user_id, name, UserRole::Volunteer)
}

#[must_use]
pub fn victim(user_id: &str, name: &str) -> Responder {
    Responder::new(user_id, name, UserRole::Victim)
}

#[must_use]
pub fn ngo(user_id: &str, name: &str) -> Responder {
    Responder::new(user_id, name, UserRole::Ngo)
}

/// A pending offer-response record, for seeding the store directly.
#[must_use]
pub fn response(id: &str, request_id: &str, responder_id: &str, time: Millis) -> Response {
    Response {
        id: id.to_owned(),
        request_id: request_id.to_owned(),
        responder_id: responder_id.to_owned(),
        kind: ResponseKind::Offer,
        category: Category::Shelter,
        title: "Tent for family".to_owned(),
        time,
        status: ResponseStatus::Pending,
        version: 1,
    }
}

/// A directory built from `(user_id, name, role)` triples.
#[must_use]
pub fn directory(entries: &[(&str, &str, UserRole)]) -> HashMap<String, UserProfile> {
    entries
        .iter()
        .map(|&(id, name, role)| (id.to_owned(), UserProfile::new(name, role)))
        .collect()
}
