//! Resource records: posted needs and offers.
//!
//! # Status machine
//!
//! ```text
//! pending ──assign──▶ addressing ──complete──▶ resolved
//!                         ▲                       │
//!                         └────────reopen─────────┘
//! ```
//!
//! `pending → resolved` has no edge. Every status change goes through
//! [`Resource::apply`], which rejects anything not drawn above.
//!
//! # Invariants
//!
//! 1. `title`, `description`, `location`, `user_id`, `username` are non-empty.
//! 2. `people`, when present, is at least 1.
//! 3. `assigned_to` is only written while the resource is (or becomes)
//!    `addressing`.
//! 4. `version` increments exactly once per applied patch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Millis;
use crate::error::{ReliefError, ReliefResult};
use crate::response::ResponseKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Need,
    Offer,
}

impl ResourceKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Need => "need",
            Self::Offer => "offer",
        }
    }

    /// The kind of response a user files against this resource: help is
    /// offered for a need, an offer is requested.
    #[must_use]
    pub const fn response_kind(self) -> ResponseKind {
        match self {
            Self::Need => ResponseKind::Offer,
            Self::Offer => ResponseKind::Request,
        }
    }
}

impl FromStr for ResourceKind {
    type Err = ReliefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "need" => Ok(Self::Need),
            "offer" => Ok(Self::Offer),
            other => Err(ReliefError::validation(format!(
                "type must be 'need' or 'offer', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Water,
    Shelter,
    Food,
    Supplies,
    Medical,
    Safety,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Water,
        Category::Shelter,
        Category::Food,
        Category::Supplies,
        Category::Medical,
        Category::Safety,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Water => "water",
            Self::Shelter => "shelter",
            Self::Food => "food",
            Self::Supplies => "supplies",
            Self::Medical => "medical",
            Self::Safety => "safety",
        }
    }
}

impl FromStr for Category {
    type Err = ReliefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ReliefError::validation(format!("unknown category '{wanted}'")))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    #[default]
    Pending,
    Addressing,
    Resolved,
}

impl ResourceStatus {
    pub const ALL: [ResourceStatus; 3] = [
        ResourceStatus::Pending,
        ResourceStatus::Addressing,
        ResourceStatus::Resolved,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Addressing => "addressing",
            Self::Resolved => "resolved",
        }
    }

    /// Whether `self → next` is an edge of the status machine.
    #[must_use]
    pub const fn can_transition_to(self, next: ResourceStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Addressing)
                | (Self::Addressing, Self::Resolved)
                | (Self::Resolved, Self::Addressing)
        )
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub quantity: u32,
}

impl Item {
    #[must_use]
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            name: name.into(),
            quantity,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub category: Category,
    pub title: String,
    pub description: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_notes: Option<String>,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub people: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    #[serde(default)]
    pub status: ResourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    pub timestamp: Millis,
    pub user_id: String,
    pub username: String,
    /// Optimistic concurrency token. Records written before versioning
    /// existed deserialize as version 0.
    #[serde(default)]
    pub version: u64,
}

impl Resource {
    /// Build a fresh `pending` resource from validated input.
    pub fn from_new(id: String, input: NewResource, timestamp: Millis) -> ReliefResult<Self> {
        input.validate()?;
        Ok(Self {
            id,
            kind: input.kind,
            category: input.category,
            title: input.title.trim().to_owned(),
            description: input.description.trim().to_owned(),
            location: input.location.trim().to_owned(),
            location_details: input.location_details,
            contact: input.contact,
            contact_name: input.contact_name,
            special_notes: input.special_notes,
            urgent: input.urgent,
            people: input.people,
            items: input.items,
            status: ResourceStatus::Pending,
            assigned_to: None,
            timestamp,
            user_id: input.user_id,
            username: input.username,
            version: 1,
        })
    }

    /// Merge `patch` into this record.
    ///
    /// On error the record is left untouched.
    pub fn apply(&mut self, patch: ResourcePatch) -> ReliefResult<()> {
        patch.validate()?;

        if let Some(expected) = patch.expected_version
            && expected != self.version
        {
            return Err(ReliefError::Conflict {
                entity: "resource",
                id: self.id.clone(),
                expected,
                actual: self.version,
            });
        }

        let next_status = patch.status.unwrap_or(self.status);
        if next_status != self.status && !self.status.can_transition_to(next_status) {
            return Err(ReliefError::IllegalTransition {
                entity: "resource",
                from: self.status.as_str(),
                to: next_status.as_str(),
            });
        }
        if patch.assigned_to.is_some() && next_status != ResourceStatus::Addressing {
            return Err(ReliefError::validation(
                "assignedTo can only be set on a resource being addressed",
            ));
        }
        if self.status == ResourceStatus::Pending
            && next_status == ResourceStatus::Addressing
            && patch.assigned_to.is_none()
        {
            return Err(ReliefError::validation(
                "assignedTo is required when a resource starts being addressed",
            ));
        }

        let ResourcePatch {
            title,
            description,
            location,
            location_details,
            contact,
            contact_name,
            special_notes,
            urgent,
            people,
            items,
            status: _,
            assigned_to,
            expected_version: _,
        } = patch;

        if let Some(v) = title {
            self.title = v.trim().to_owned();
        }
        if let Some(v) = description {
            self.description = v.trim().to_owned();
        }
        if let Some(v) = location {
            self.location = v.trim().to_owned();
        }
        if location_details.is_some() {
            self.location_details = location_details;
        }
        if contact.is_some() {
            self.contact = contact;
        }
        if contact_name.is_some() {
            self.contact_name = contact_name;
        }
        if special_notes.is_some() {
            self.special_notes = special_notes;
        }
        if let Some(v) = urgent {
            self.urgent = v;
        }
        if people.is_some() {
            self.people = people;
        }
        if let Some(v) = items {
            self.items = v;
        }
        if assigned_to.is_some() {
            self.assigned_to = assigned_to.map(|a| a.trim().to_owned());
        }
        self.status = next_status;
        self.version += 1;
        Ok(())
    }

    /// Case-insensitive match over title, description, and location.
    #[must_use]
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [&self.title, &self.description, &self.location]
            .into_iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// Input for creating a resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewResource {
    pub kind: ResourceKind,
    pub category: Category,
    pub title: String,
    pub description: String,
    pub location: String,
    pub location_details: Option<String>,
    pub contact: Option<String>,
    pub contact_name: Option<String>,
    pub special_notes: Option<String>,
    pub urgent: bool,
    pub people: Option<u32>,
    pub items: Vec<Item>,
    pub user_id: String,
    pub username: String,
}

impl NewResource {
    #[must_use]
    pub fn new(
        kind: ResourceKind,
        category: Category,
        title: impl Into<String>,
        description: impl Into<String>,
        location: impl Into<String>,
        user_id: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            category,
            title: title.into(),
            description: description.into(),
            location: location.into(),
            location_details: None,
            contact: None,
            contact_name: None,
            special_notes: None,
            urgent: false,
            people: None,
            items: Vec::new(),
            user_id: user_id.into(),
            username: username.into(),
        }
    }

    #[must_use]
    pub fn urgent(mut self, urgent: bool) -> Self {
        self.urgent = urgent;
        self
    }

    #[must_use]
    pub fn people(mut self, people: u32) -> Self {
        self.people = Some(people);
        self
    }

    #[must_use]
    pub fn item(mut self, name: impl Into<String>, quantity: u32) -> Self {
        self.items.push(Item::new(name, quantity));
        self
    }

    #[must_use]
    pub fn location_details(mut self, details: impl Into<String>) -> Self {
        self.location_details = Some(details.into());
        self
    }

    #[must_use]
    pub fn contact(mut self, name: impl Into<String>, contact: impl Into<String>) -> Self {
        self.contact_name = Some(name.into());
        self.contact = Some(contact.into());
        self
    }

    #[must_use]
    pub fn special_notes(mut self, notes: impl Into<String>) -> Self {
        self.special_notes = Some(notes.into());
        self
    }

    /// Check required fields. Runs before any write.
    pub fn validate(&self) -> ReliefResult<()> {
        require_text("title", &self.title)?;
        require_text("description", &self.description)?;
        require_text("location", &self.location)?;
        require_text("userId", &self.user_id)?;
        require_text("username", &self.username)?;
        validate_people(self.people)?;
        validate_items(&self.items)
    }
}

/// Partial update for a resource. Unset fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourcePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub location_details: Option<String>,
    pub contact: Option<String>,
    pub contact_name: Option<String>,
    pub special_notes: Option<String>,
    pub urgent: Option<bool>,
    pub people: Option<u32>,
    pub items: Option<Vec<Item>>,
    pub status: Option<ResourceStatus>,
    pub assigned_to: Option<String>,
    /// Reject the patch unless the stored record is still at this version.
    pub expected_version: Option<u64>,
}

impl ResourcePatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn urgent(mut self, urgent: bool) -> Self {
        self.urgent = Some(urgent);
        self
    }

    #[must_use]
    pub fn people(mut self, people: u32) -> Self {
        self.people = Some(people);
        self
    }

    #[must_use]
    pub fn items(mut self, items: Vec<Item>) -> Self {
        self.items = Some(items);
        self
    }

    #[must_use]
    pub fn special_notes(mut self, notes: impl Into<String>) -> Self {
        self.special_notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn status(mut self, status: ResourceStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn assigned_to(mut self, assignee: impl Into<String>) -> Self {
        self.assigned_to = Some(assignee.into());
        self
    }

    #[must_use]
    pub fn expecting_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    fn validate(&self) -> ReliefResult<()> {
        for (field, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("location", &self.location),
            ("assignedTo", &self.assigned_to),
        ] {
            if let Some(value) = value {
                require_text(field, value)?;
            }
        }
        validate_people(self.people)?;
        if let Some(items) = &self.items {
            validate_items(items)?;
        }
        Ok(())
    }
}

fn require_text(field: &str, value: &str) -> ReliefResult<()> {
    if value.trim().is_empty() {
        return Err(ReliefError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn validate_people(people: Option<u32>) -> ReliefResult<()> {
    if people == Some(0) {
        return Err(ReliefError::validation("people must be at least 1"));
    }
    Ok(())
}

fn validate_items(items: &[Item]) -> ReliefResult<()> {
    for item in items {
        require_text("item name", &item.name)?;
        if item.quantity == 0 {
            return Err(ReliefError::validation(format!(
                "item '{}' must have a quantity of at least 1",
                item.name
            )));
        }
    }
    Ok(())
}
