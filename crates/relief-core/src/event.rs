//! The closed set of change notifications carried by the event bus.

use std::fmt;
use std::str::FromStr;

use crate::error::ReliefError;

/// A named change to one of the stored collections.
///
/// Notifications carry no payload. Subscribers re-read the collections they
/// care about when one arrives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKind {
    ResourceCreated,
    ResourceUpdated,
    ResponseCreated,
    ResponseUpdated,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 4] = [
        ChangeKind::ResourceCreated,
        ChangeKind::ResourceUpdated,
        ChangeKind::ResponseCreated,
        ChangeKind::ResponseUpdated,
    ];

    /// Stable wire name, shared with other tabs and external listeners.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResourceCreated => "resource-created",
            Self::ResourceUpdated => "resource-updated",
            Self::ResponseCreated => "response-created",
            Self::ResponseUpdated => "response-updated",
        }
    }

    /// Whether this change concerns the resource collection.
    #[must_use]
    pub const fn is_resource(self) -> bool {
        matches!(self, Self::ResourceCreated | Self::ResourceUpdated)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = ReliefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ReliefError::validation(format!("unknown change kind '{s}'")))
    }
}
