//! Proptest generators for valid inputs.

use proptest::prelude::*;
use relief_core::{Category, NewResource, ResourceKind, UserRole};

pub fn arb_category() -> impl Strategy<Value = Category> {
    proptest::sample::select(Category::ALL.to_vec())
}

pub fn arb_resource_kind() -> impl Strategy<Value = ResourceKind> {
    prop_oneof![Just(ResourceKind::Need), Just(ResourceKind::Offer)]
}

pub fn arb_role() -> impl Strategy<Value = UserRole> {
    proptest::sample::select(UserRole::ALL.to_vec())
}

/// Non-blank single-line text.
pub fn arb_text() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 ]{0,23}"
}

/// A `NewResource` that passes validation.
pub fn arb_new_resource() -> impl Strategy<Value = NewResource> {
    (
        arb_resource_kind(),
        arb_category(),
        arb_text(),
        arb_text(),
        arb_text(),
        "[a-z]{1,8}-[0-9]{1,3}",
        any::<bool>(),
        1u32..50,
    )
        .prop_map(
            |(kind, category, title, description, location, user_id, urgent, people)| {
                NewResource::new(
                    kind,
                    category,
                    title,
                    description,
                    location,
                    user_id.clone(),
                    user_id,
                )
                .urgent(urgent)
                .people(people)
            },
        )
}
