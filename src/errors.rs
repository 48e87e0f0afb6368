//! Unified error type for the ledger core.
//!
//! Every fallible operation returns [`Result`]. Variants map onto the failure
//! taxonomy callers need to tell apart: bad input, missing resources, denied
//! access, conflicts with existing state, and store faults.

use std::fmt;
use thiserror::Error;

/// Kinds of named or identified resources that can be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A budget
    Budget,
    /// A budget membership
    Member,
    /// An account
    Account,
    /// A payee
    Payee,
    /// A category
    Category,
    /// A category group
    Group,
    /// A ledger transaction
    Transaction,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Budget => "budget",
            Self::Member => "member",
            Self::Account => "account",
            Self::Payee => "payee",
            Self::Category => "category",
            Self::Group => "group",
            Self::Transaction => "transaction",
        };
        f.write_str(label)
    }
}

/// Coarse classification of an [`Error`], used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No verified caller identity
    Authentication,
    /// Valid identity, insufficient clearance
    Authorization,
    /// Malformed input
    Validation,
    /// A named resource does not exist in the budget
    Resolution,
    /// The request conflicts with existing state
    Conflict,
    /// Store or configuration fault on our side
    Store,
}

/// All errors produced by the ledger core.
#[derive(Debug, Error)]
pub enum Error {
    /// The call carried no authenticated caller.
    #[error("Authentication required")]
    Unauthenticated,

    /// The caller may not perform the operation on this budget.
    #[error("Forbidden: {reason}")]
    Forbidden {
        /// Short explanation safe to show the caller
        reason: String,
    },

    /// The request was malformed.
    #[error("Invalid request: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// A referenced resource does not exist in the budget.
    #[error("Could not find {kind} '{name}'")]
    NotFound {
        /// What kind of resource was looked up
        kind: ResourceKind,
        /// The name or identifier that was looked up
        name: String,
    },

    /// The request conflicts with existing state.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict
        message: String,
    },

    /// Stored rows violate a ledger invariant.
    #[error("Ledger integrity error: {message}")]
    Integrity {
        /// Which invariant was broken
        message: String,
    },

    /// Settings could not be loaded.
    #[error("Configuration error: {message}")]
    Config {
        /// Details of the configuration problem
        message: String,
    },

    /// The store rejected or failed an operation.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl Error {
    /// Shorthand for a validation failure.
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a conflict.
    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Turns a unique-key violation from the store into [`Error::Conflict`]
    /// with `message`; any other store error passes through.
    pub(crate) fn duplicate(err: sea_orm::DbErr, message: impl Into<String>) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => Self::conflict(message),
            _ => Self::Database(err),
        }
    }

    /// Shorthand for an authorization failure.
    pub(crate) fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    /// Shorthand for a missing resource.
    pub(crate) fn not_found(kind: ResourceKind, name: impl ToString) -> Self {
        Self::NotFound {
            kind,
            name: name.to_string(),
        }
    }

    /// Classifies this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated => ErrorKind::Authentication,
            Self::Forbidden { .. } => ErrorKind::Authorization,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::Resolution,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Integrity { .. } | Self::Config { .. } | Self::Database(_) => ErrorKind::Store,
        }
    }

    /// True when the caller must change the request before resubmitting.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::Resolution | ErrorKind::Conflict
        )
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
