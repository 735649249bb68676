//! Dashboard roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReliefError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Victim,
    Volunteer,
    Ngo,
    Government,
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 5] = [
        UserRole::Victim,
        UserRole::Volunteer,
        UserRole::Ngo,
        UserRole::Government,
        UserRole::Admin,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Victim => "victim",
            Self::Volunteer => "volunteer",
            Self::Ngo => "ngo",
            Self::Government => "government",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = ReliefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ReliefError::validation(format!("unknown role '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_any_case_with_padding() {
        assert_eq!(" NGO ".parse::<UserRole>().unwrap(), UserRole::Ngo);
        for role in UserRole::ALL {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_validation_error() {
        let err = "mayor".parse::<UserRole>().unwrap_err();
        assert!(matches!(err, ReliefError::Validation { .. }));
        assert!(err.to_string().contains("mayor"));
    }
}
