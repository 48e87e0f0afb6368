//! Role ladder - the privilege ordering of budget memberships.
//!
//! Roles are totally ordered with `Admin` at the top. All comparison logic is
//! pure; the clearance gate in [`crate::core::clearance`] is the only place
//! that pairs a role with a stored membership.

use crate::errors::{Error, Result};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A membership role within a budget.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Owner of the budget; exactly one per budget
    #[sea_orm(string_value = "ADMIN")]
    Admin,
    /// Manages accounts, categories, members and assignments
    #[sea_orm(string_value = "MANAGER")]
    Manager,
    /// Logs transactions and payees
    #[sea_orm(string_value = "CONTRIBUTOR")]
    Contributor,
    /// Read-only access
    #[sea_orm(string_value = "VIEWER")]
    Viewer,
}

/// Outcome of comparing a caller's role against a required role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clearance {
    /// The caller is at least as privileged as required
    Sufficient,
    /// The caller is less privileged than required
    Insufficient,
}

impl Role {
    /// Position on the ladder, `0` being the most privileged.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Admin => 0,
            Self::Manager => 1,
            Self::Contributor => 2,
            Self::Viewer => 3,
        }
    }

    /// True if `self` is at least as privileged as `required`.
    #[must_use]
    pub const fn is_at_least(self, required: Self) -> bool {
        self.rank() <= required.rank()
    }

    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Manager => "MANAGER",
            Self::Contributor => "CONTRIBUTOR",
            Self::Viewer => "VIEWER",
        }
    }
}

/// Compares a caller's role against the role an operation requires.
#[must_use]
pub const fn compare(caller: Role, required: Role) -> Clearance {
    if caller.is_at_least(required) {
        Clearance::Sufficient
    } else {
        Clearance::Insufficient
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Self::Admin),
            "MANAGER" => Ok(Self::Manager),
            "CONTRIBUTOR" => Ok(Self::Contributor),
            "VIEWER" => Ok(Self::Viewer),
            _ => Err(Error::validation(format!("unknown role '{s}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    const LADDER: [Role; 4] = [Role::Admin, Role::Manager, Role::Contributor, Role::Viewer];

    #[test]
    fn test_compare_is_total_order() {
        for (i, caller) in LADDER.iter().enumerate() {
            for (j, required) in LADDER.iter().enumerate() {
                let expected = if i <= j {
                    Clearance::Sufficient
                } else {
                    Clearance::Insufficient
                };
                assert_eq!(compare(*caller, *required), expected, "{caller} vs {required}");
            }
        }
    }

    #[test]
    fn test_contributor_cannot_act_as_manager() {
        assert_eq!(
            compare(Role::Contributor, Role::Manager),
            Clearance::Insufficient
        );
        assert_eq!(compare(Role::Admin, Role::Viewer), Clearance::Sufficient);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("Manager".parse::<Role>().unwrap(), Role::Manager);
        assert_eq!(" CONTRIBUTOR ".parse::<Role>().unwrap(), Role::Contributor);
        assert_eq!("viewer".parse::<Role>().unwrap(), Role::Viewer);
    }

    #[test]
    fn test_parse_rejects_unknown_role() {
        let err = "owner".parse::<Role>().unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}
