//! Response records: a user's action against a resource.
//!
//! # Status machine
//!
//! | From | To | Operation |
//! |------|----|-----------|
//! | `pending` | `accepted` | accept |
//! | `pending` | `rejected` | reject |
//! | `accepted` | `rejected` | reject |
//! | `accepted` | `completed` | complete |
//!
//! `rejected` and `completed` are terminal. `pending` and `accepted` are the
//! active states.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Millis;
use crate::error::{ReliefError, ReliefResult};
use crate::resource::Category;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Offer,
    Request,
}

impl ResponseKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Request => "request",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Completed,
}

impl ResponseStatus {
    pub const ALL: [ResponseStatus; 4] = [
        ResponseStatus::Pending,
        ResponseStatus::Accepted,
        ResponseStatus::Rejected,
        ResponseStatus::Completed,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }

    #[must_use]
    pub const fn can_transition_to(self, next: ResponseStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Accepted)
                | (Self::Pending, Self::Rejected)
                | (Self::Accepted, Self::Rejected)
                | (Self::Accepted, Self::Completed)
        )
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseStatus {
    type Err = ReliefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ReliefError::validation(format!("unknown response status '{s}'")))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: String,
    pub request_id: String,
    pub responder_id: String,
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    pub category: Category,
    pub title: String,
    pub time: Millis,
    #[serde(default)]
    pub status: ResponseStatus,
    #[serde(default)]
    pub version: u64,
}

impl Response {
    /// Move to `next`, enforcing the status machine and an optional
    /// expected version.
    pub fn transition(
        &mut self,
        next: ResponseStatus,
        expected_version: Option<u64>,
    ) -> ReliefResult<()> {
        if let Some(expected) = expected_version
            && expected != self.version
        {
            return Err(ReliefError::Conflict {
                entity: "response",
                id: self.id.clone(),
                expected,
                actual: self.version,
            });
        }
        if !self.status.can_transition_to(next) {
            return Err(ReliefError::IllegalTransition {
                entity: "response",
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        self.version += 1;
        Ok(())
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}
