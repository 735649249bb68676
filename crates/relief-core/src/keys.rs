//! Typed namespace for durable store keys.
//!
//! Every collection lives under one of three key shapes:
//!
//! | Key | Contents |
//! |-----|----------|
//! | `resources` | all resources (global) |
//! | `responses_{userId}` | responses owned by that user |
//! | `responded_requests_{userId}` | resource ids that user has acted on |
//!
//! Callers build keys through [`StoreKey`] so a misspelled key cannot be
//! written.

use std::fmt;

const RESOURCES: &str = "resources";
const RESPONSES_PREFIX: &str = "responses_";
const RESPONDED_PREFIX: &str = "responded_requests_";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKey {
    Resources,
    Responses(String),
    RespondedRequests(String),
}

impl StoreKey {
    #[must_use]
    pub fn responses(user_id: impl Into<String>) -> Self {
        Self::Responses(user_id.into())
    }

    #[must_use]
    pub fn responded_requests(user_id: impl Into<String>) -> Self {
        Self::RespondedRequests(user_id.into())
    }

    /// Parse a raw backend key. Returns `None` for keys outside the namespace.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == RESOURCES {
            return Some(Self::Resources);
        }
        if let Some(user) = raw.strip_prefix(RESPONDED_PREFIX) {
            return (!user.is_empty()).then(|| Self::RespondedRequests(user.to_owned()));
        }
        if let Some(user) = raw.strip_prefix(RESPONSES_PREFIX) {
            return (!user.is_empty()).then(|| Self::Responses(user.to_owned()));
        }
        None
    }

    /// The owning user for per-user keys.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Resources => None,
            Self::Responses(user) | Self::RespondedRequests(user) => Some(user),
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resources => f.write_str(RESOURCES),
            Self::Responses(user) => write!(f, "{RESPONSES_PREFIX}{user}"),
            Self::RespondedRequests(user) => write!(f, "{RESPONDED_PREFIX}{user}"),
        }
    }
}
