//! Budget and membership business logic.
//!
//! A budget is created together with exactly one ADMIN membership for its
//! creator. That membership can never be granted, changed, removed or given
//! up afterwards, so every budget keeps a single ADMIN for its whole life.

use crate::{
    core::{
        clearance::{BudgetScope, Caller, Operation},
        role::Role,
    },
    entities::{
        Account, Budget, BudgetMember, Category, CategoryGroup, MonthlyAssignment, Payee,
        Transaction, TransactionSplit, Transfer, account, budget, budget_member, category,
        category_group, monthly_assignment, payee, transaction, transaction_split, transfer,
    },
    errors::{Error, ResourceKind, Result},
};
use sea_orm::{
    Condition, QueryOrder, Set, TransactionTrait, prelude::*,
    sea_query::{Query, SelectStatement},
};
use tracing::{info, instrument};

fn normalize_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("budget name cannot be empty"));
    }
    Ok(name.to_string())
}

/// Creates a budget owned by `caller`.
///
/// The budget row and the caller's ADMIN membership are written in one unit.
/// Returns the budget with a scope for the new owner.
#[instrument(skip(db))]
pub async fn create_budget(
    db: &DatabaseConnection,
    caller: Caller,
    name: &str,
) -> Result<(budget::Model, BudgetScope)> {
    let name = normalize_name(name)?;

    let txn = db.begin().await?;
    let created = budget::ActiveModel {
        name: Set(name),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    budget_member::ActiveModel {
        budget_id: Set(created.id),
        user_id: Set(caller.user_id()),
        role: Set(Role::Admin),
        created_at: Set(chrono::Utc::now()),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(budget_id = created.id, name = %created.name, "Created budget");
    let scope = BudgetScope::new(created.id, caller, Role::Admin);
    Ok((created, scope))
}

/// Retrieves the scoped budget.
pub async fn get_budget(db: &DatabaseConnection, scope: &BudgetScope) -> Result<budget::Model> {
    scope.require(Operation::ViewBudget)?;
    Budget::find_by_id(scope.budget_id())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(ResourceKind::Budget, scope.budget_id()))
}

/// Lists every budget `caller` is a member of, with the caller's role.
pub async fn list_budgets(
    db: &DatabaseConnection,
    caller: Caller,
) -> Result<Vec<(budget::Model, Role)>> {
    let memberships = BudgetMember::find()
        .filter(budget_member::Column::UserId.eq(caller.user_id()))
        .order_by_asc(budget_member::Column::BudgetId)
        .find_also_related(Budget)
        .all(db)
        .await?;

    Ok(memberships
        .into_iter()
        .filter_map(|(member, budget)| budget.map(|budget| (budget, member.role)))
        .collect())
}

/// Renames the scoped budget.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn rename_budget(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    name: &str,
) -> Result<budget::Model> {
    scope.require(Operation::RenameBudget)?;
    let name = normalize_name(name)?;

    let existing = get_budget(db, scope).await?;
    let mut active: budget::ActiveModel = existing.into();
    active.name = Set(name);
    let updated = active.update(db).await?;

    info!(name = %updated.name, "Renamed budget");
    Ok(updated)
}

/// Ids of every transaction in a budget, as a subquery.
fn budget_transactions(budget_id: i64) -> SelectStatement {
    Query::select()
        .column(transaction::Column::Id)
        .from(Transaction)
        .and_where(transaction::Column::BudgetId.eq(budget_id))
        .to_owned()
}

/// Deletes the scoped budget and everything in it.
///
/// Rows are removed children-first inside one unit.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn delete_budget(db: &DatabaseConnection, scope: &BudgetScope) -> Result<()> {
    scope.require(Operation::DeleteBudget)?;
    let budget_id = scope.budget_id();

    let txn = db.begin().await?;
    Transfer::delete_many()
        .filter(
            Condition::any()
                .add(transfer::Column::FromTransactionId.in_subquery(budget_transactions(budget_id)))
                .add(transfer::Column::ToTransactionId.in_subquery(budget_transactions(budget_id))),
        )
        .exec(&txn)
        .await?;
    TransactionSplit::delete_many()
        .filter(transaction_split::Column::TransactionId.in_subquery(budget_transactions(budget_id)))
        .exec(&txn)
        .await?;
    Transaction::delete_many()
        .filter(transaction::Column::BudgetId.eq(budget_id))
        .exec(&txn)
        .await?;
    MonthlyAssignment::delete_many()
        .filter(
            monthly_assignment::Column::CategoryId.in_subquery(
                Query::select()
                    .column(category::Column::Id)
                    .from(Category)
                    .and_where(category::Column::BudgetId.eq(budget_id))
                    .to_owned(),
            ),
        )
        .exec(&txn)
        .await?;
    Category::delete_many()
        .filter(category::Column::BudgetId.eq(budget_id))
        .exec(&txn)
        .await?;
    CategoryGroup::delete_many()
        .filter(category_group::Column::BudgetId.eq(budget_id))
        .exec(&txn)
        .await?;
    Payee::delete_many()
        .filter(payee::Column::BudgetId.eq(budget_id))
        .exec(&txn)
        .await?;
    Account::delete_many()
        .filter(account::Column::BudgetId.eq(budget_id))
        .exec(&txn)
        .await?;
    BudgetMember::delete_many()
        .filter(budget_member::Column::BudgetId.eq(budget_id))
        .exec(&txn)
        .await?;
    let result = Budget::delete_by_id(budget_id).exec(&txn).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found(ResourceKind::Budget, budget_id));
    }
    txn.commit().await?;

    info!("Deleted budget");
    Ok(())
}

async fn find_member(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    user_id: i64,
) -> Result<budget_member::Model> {
    BudgetMember::find_by_id((scope.budget_id(), user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(ResourceKind::Member, user_id))
}

/// Adds `user_id` to the budget with `role`.
///
/// A budget already has its one ADMIN, so asking for ADMIN is a conflict.
/// Nobody can grant a role above their own.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn add_member(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    user_id: i64,
    role: Role,
) -> Result<budget_member::Model> {
    scope.require(Operation::ManageMembers)?;
    if role == Role::Admin {
        return Err(Error::conflict("a budget has exactly one ADMIN"));
    }
    if !scope.role().is_at_least(role) {
        return Err(Error::forbidden(format!(
            "a {} cannot grant the {role} role",
            scope.role()
        )));
    }

    // The (budget_id, user_id) key rejects a second membership
    let member = budget_member::ActiveModel {
        budget_id: Set(scope.budget_id()),
        user_id: Set(user_id),
        role: Set(role),
        created_at: Set(chrono::Utc::now()),
    }
    .insert(db)
    .await
    .map_err(|err| {
        Error::duplicate(
            err,
            format!("user {user_id} is already a member of this budget"),
        )
    })?;

    info!(user_id, %role, "Added member");
    Ok(member)
}

/// Lists the budget's members, most privileged first.
pub async fn list_members(
    db: &DatabaseConnection,
    scope: &BudgetScope,
) -> Result<Vec<budget_member::Model>> {
    scope.require(Operation::ViewMembers)?;
    let mut members = BudgetMember::find()
        .filter(budget_member::Column::BudgetId.eq(scope.budget_id()))
        .order_by_asc(budget_member::Column::UserId)
        .all(db)
        .await?;
    members.sort_by_key(|member| member.role.rank());
    Ok(members)
}

/// Changes another member's role.
///
/// The caller must rank at least as high as both the old and the new role.
/// Promoting anyone to ADMIN conflicts with the existing ADMIN; the ADMIN's
/// own membership cannot be changed at all.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn change_member_role(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    user_id: i64,
    role: Role,
) -> Result<budget_member::Model> {
    scope.require(Operation::ManageMembers)?;
    if user_id == scope.caller().user_id() {
        return Err(Error::forbidden("members cannot change their own role"));
    }
    if role == Role::Admin {
        return Err(Error::conflict("a budget has exactly one ADMIN"));
    }

    let member = find_member(db, scope, user_id).await?;
    if member.role == Role::Admin {
        return Err(Error::forbidden("the ADMIN role cannot be changed"));
    }
    if !scope.role().is_at_least(member.role) || !scope.role().is_at_least(role) {
        return Err(Error::forbidden(format!(
            "a {} cannot change a {} to {role}",
            scope.role(),
            member.role
        )));
    }

    let previous = member.role;
    let mut active: budget_member::ActiveModel = member.into();
    active.role = Set(role);
    let updated = active.update(db).await?;

    info!(user_id, from = %previous, to = %role, "Changed member role");
    Ok(updated)
}

/// Removes another member from the budget.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn remove_member(db: &DatabaseConnection, scope: &BudgetScope, user_id: i64) -> Result<()> {
    scope.require(Operation::ManageMembers)?;

    let member = find_member(db, scope, user_id).await?;
    if member.role == Role::Admin {
        return Err(Error::forbidden("the ADMIN cannot be removed"));
    }
    if !scope.role().is_at_least(member.role) {
        return Err(Error::forbidden(format!(
            "a {} cannot remove a {}",
            scope.role(),
            member.role
        )));
    }

    BudgetMember::delete_by_id((scope.budget_id(), user_id))
        .exec(db)
        .await?;
    info!(user_id, "Removed member");
    Ok(())
}

/// Gives up the caller's own membership. The ADMIN cannot leave.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn leave_budget(db: &DatabaseConnection, scope: &BudgetScope) -> Result<()> {
    scope.require(Operation::LeaveBudget)?;
    if scope.role() == Role::Admin {
        return Err(Error::forbidden(
            "the ADMIN cannot leave; delete the budget instead",
        ));
    }

    let user_id = scope.caller().user_id();
    let result = BudgetMember::delete_by_id((scope.budget_id(), user_id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found(ResourceKind::Member, user_id));
    }
    info!(user_id, "Left budget");
    Ok(())
}
