//! Clearance gate - authorizes budget-scoped calls.
//!
//! A caller identity plus a budget id go in; a [`BudgetScope`] comes out if the
//! caller holds a membership in that budget whose role satisfies the operation.
//! `BudgetScope` has no public constructor, so holding one proves the gate was
//! passed, and its budget id is the only budget id ledger operations accept.

use crate::{
    core::role::{self, Clearance, Role},
    entities::BudgetMember,
    errors::{Error, Result},
};
use sea_orm::prelude::*;
use tracing::{debug, instrument, warn};

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Caller {
    user_id: i64,
}

impl Caller {
    /// Wraps an identity the authentication layer already verified.
    #[must_use]
    pub const fn authenticated(user_id: i64) -> Self {
        Self { user_id }
    }

    /// Converts an optional identity, failing when it is absent.
    pub fn from_identity(user_id: Option<i64>) -> Result<Self> {
        user_id.map(Self::authenticated).ok_or(Error::Unauthenticated)
    }

    /// The verified user id.
    #[must_use]
    pub const fn user_id(&self) -> i64 {
        self.user_id
    }
}

/// Budget-scoped operations and the clearance each requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Read budget details, accounts, categories, payees and transactions
    ViewBudget,
    /// List members
    ViewMembers,
    /// Read monthly reports and capital
    ViewReports,
    /// Give up one's own membership
    LeaveBudget,
    /// Create, update or delete transactions
    LogTransaction,
    /// Create or retire payees
    ManagePayees,
    /// Rename the budget
    RenameBudget,
    /// Add, remove or re-role members
    ManageMembers,
    /// Create, rename, soft-delete or restore accounts
    ManageAccounts,
    /// Create, edit or delete categories and groups
    ManageCategories,
    /// Assign money to categories
    AssignMoney,
    /// Delete the budget and everything in it
    DeleteBudget,
    /// Permanently delete a soft-deleted account
    HardDeleteAccount,
}

impl Operation {
    /// Minimum role needed to perform this operation.
    #[must_use]
    pub const fn required_role(self) -> Role {
        match self {
            Self::ViewBudget | Self::ViewMembers | Self::ViewReports | Self::LeaveBudget => {
                Role::Viewer
            }
            Self::LogTransaction | Self::ManagePayees => Role::Contributor,
            Self::RenameBudget
            | Self::ManageMembers
            | Self::ManageAccounts
            | Self::ManageCategories
            | Self::AssignMoney => Role::Manager,
            Self::DeleteBudget | Self::HardDeleteAccount => Role::Admin,
        }
    }
}

/// Proof that a caller holds a membership in a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetScope {
    budget_id: i64,
    caller: Caller,
    role: Role,
}

impl BudgetScope {
    /// Only the gate and budget creation may build a scope.
    pub(crate) const fn new(budget_id: i64, caller: Caller, role: Role) -> Self {
        Self {
            budget_id,
            caller,
            role,
        }
    }

    /// The authorized budget.
    #[must_use]
    pub const fn budget_id(&self) -> i64 {
        self.budget_id
    }

    /// The caller the scope was issued to.
    #[must_use]
    pub const fn caller(&self) -> Caller {
        self.caller
    }

    /// The caller's role in the budget.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Fails unless the scope's role satisfies `operation`.
    pub fn require(&self, operation: Operation) -> Result<()> {
        let required = operation.required_role();
        match role::compare(self.role, required) {
            Clearance::Sufficient => Ok(()),
            Clearance::Insufficient => {
                warn!(
                    budget_id = self.budget_id,
                    user_id = self.caller.user_id,
                    role = %self.role,
                    ?operation,
                    "Insufficient clearance"
                );
                Err(Error::forbidden(format!(
                    "{operation:?} requires the {required} role"
                )))
            }
        }
    }
}

/// Authorizes `caller` for `operation` on `budget_id`.
///
/// A missing membership and a nonexistent budget are both reported as
/// [`Error::Forbidden`], so callers cannot discover budgets they cannot see.
#[instrument(skip(db))]
pub async fn authorize<C>(
    db: &C,
    caller: Caller,
    budget_id: i64,
    operation: Operation,
) -> Result<BudgetScope>
where
    C: ConnectionTrait,
{
    let Some(member) = BudgetMember::find_by_id((budget_id, caller.user_id))
        .one(db)
        .await?
    else {
        warn!(budget_id, user_id = caller.user_id, "No membership for budget");
        return Err(Error::forbidden("not a member of this budget"));
    };

    let scope = BudgetScope::new(budget_id, caller, member.role);
    scope.require(operation)?;
    debug!(budget_id, role = %member.role, "Clearance granted");
    Ok(scope)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::budget;
    use crate::test_utils::*;

    #[test]
    fn test_missing_identity_is_unauthenticated() {
        assert!(matches!(
            Caller::from_identity(None),
            Err(Error::Unauthenticated)
        ));
        assert_eq!(Caller::from_identity(Some(7)).unwrap().user_id(), 7);
    }

    #[test]
    fn test_scope_require_uses_operation_table() {
        let scope = BudgetScope::new(1, Caller::authenticated(1), Role::Contributor);
        assert!(scope.require(Operation::LogTransaction).is_ok());
        assert!(scope.require(Operation::ViewReports).is_ok());
        assert!(matches!(
            scope.require(Operation::AssignMoney),
            Err(Error::Forbidden { .. })
        ));
        assert!(matches!(
            scope.require(Operation::DeleteBudget),
            Err(Error::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_authorize_admin_passes_every_operation() -> Result<()> {
        let (db, scope) = setup_with_budget().await?;
        for operation in [
            Operation::ViewBudget,
            Operation::LogTransaction,
            Operation::ManageMembers,
            Operation::AssignMoney,
            Operation::DeleteBudget,
            Operation::HardDeleteAccount,
        ] {
            let granted = authorize(&db, scope.caller(), scope.budget_id(), operation).await?;
            assert_eq!(granted.role(), Role::Admin);
            assert_eq!(granted.budget_id(), scope.budget_id());
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_authorize_contributor_rejected_from_manager_operation() -> Result<()> {
        let (db, scope) = setup_with_budget().await?;
        let contributor = Caller::authenticated(OTHER_USER);
        budget::add_member(&db, &scope, contributor.user_id(), Role::Contributor).await?;

        let result = authorize(&db, contributor, scope.budget_id(), Operation::ManageAccounts).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));

        let granted =
            authorize(&db, contributor, scope.budget_id(), Operation::LogTransaction).await?;
        assert_eq!(granted.role(), Role::Contributor);
        Ok(())
    }

    #[tokio::test]
    async fn test_authorize_non_member_is_forbidden_not_missing() -> Result<()> {
        let (db, scope) = setup_with_budget().await?;
        let stranger = Caller::authenticated(OTHER_USER);

        let existing = authorize(&db, stranger, scope.budget_id(), Operation::ViewBudget).await;
        let nonexistent = authorize(&db, stranger, 9_999, Operation::ViewBudget).await;

        assert!(matches!(existing, Err(Error::Forbidden { .. })));
        assert!(matches!(nonexistent, Err(Error::Forbidden { .. })));
        Ok(())
    }
}
