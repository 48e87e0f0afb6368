//! Account business logic.
//!
//! Accounts are soft-deleted first: a soft-deleted account keeps its history
//! but no longer resolves by name, so no new transactions can land on it. Only
//! the ADMIN can then remove it for good.

use crate::{
    core::{
        clearance::{BudgetScope, Operation},
        ledger,
    },
    entities::{Account, Transaction, account, transaction},
    errors::{Error, ResourceKind, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::HashSet;
use tracing::{info, instrument};

/// Loads an account by id and checks it belongs to the scope's budget.
pub(crate) async fn find_scoped<C>(
    db: &C,
    scope: &BudgetScope,
    account_id: i64,
) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    let model = Account::find_by_id(account_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(ResourceKind::Account, account_id))?;
    if model.budget_id != scope.budget_id() {
        return Err(Error::forbidden("account belongs to another budget"));
    }
    Ok(model)
}

/// Trims `name` and rejects a blank one.
fn account_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("account name cannot be empty"));
    }
    Ok(name.to_string())
}

/// Conflict message for a taken name; soft-deleted accounts keep theirs.
fn name_taken(name: &str) -> String {
    format!("account '{name}' already exists")
}

/// Creates an account.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn create_account(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    name: &str,
) -> Result<account::Model> {
    scope.require(Operation::ManageAccounts)?;
    let name = account_name(name)?;

    let created = account::ActiveModel {
        budget_id: Set(scope.budget_id()),
        name: Set(name.clone()),
        is_deleted: Set(false),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| Error::duplicate(err, name_taken(&name)))?;

    info!(account_id = created.id, name = %created.name, "Created account");
    Ok(created)
}

/// Retrieves one account.
pub async fn get_account(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    account_id: i64,
) -> Result<account::Model> {
    scope.require(Operation::ViewBudget)?;
    find_scoped(db, scope, account_id).await
}

/// Lists the budget's accounts by name.
pub async fn list_accounts(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    include_deleted: bool,
) -> Result<Vec<account::Model>> {
    scope.require(Operation::ViewBudget)?;

    let mut query = Account::find().filter(account::Column::BudgetId.eq(scope.budget_id()));
    if !include_deleted {
        query = query.filter(account::Column::IsDeleted.eq(false));
    }
    query
        .order_by_asc(account::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Renames an account.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn rename_account(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    account_id: i64,
    name: &str,
) -> Result<account::Model> {
    scope.require(Operation::ManageAccounts)?;
    let existing = find_scoped(db, scope, account_id).await?;
    let name = account_name(name)?;

    let mut active: account::ActiveModel = existing.into();
    active.name = Set(name.clone());
    let updated = active
        .update(db)
        .await
        .map_err(|err| Error::duplicate(err, name_taken(&name)))?;

    info!(account_id, name = %updated.name, "Renamed account");
    Ok(updated)
}

async fn set_deleted(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    account_id: i64,
    is_deleted: bool,
) -> Result<account::Model> {
    scope.require(Operation::ManageAccounts)?;
    let existing = find_scoped(db, scope, account_id).await?;
    if existing.is_deleted == is_deleted {
        let state = if is_deleted { "deleted" } else { "active" };
        return Err(Error::conflict(format!(
            "account '{}' is already {state}",
            existing.name
        )));
    }

    let mut active: account::ActiveModel = existing.into();
    active.is_deleted = Set(is_deleted);
    active.update(db).await.map_err(Into::into)
}

/// Hides an account from name resolution while keeping its history.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn soft_delete_account(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    account_id: i64,
) -> Result<account::Model> {
    let updated = set_deleted(db, scope, account_id, true).await?;
    info!(account_id, "Soft-deleted account");
    Ok(updated)
}

/// Brings a soft-deleted account back.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn restore_account(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    account_id: i64,
) -> Result<account::Model> {
    let updated = set_deleted(db, scope, account_id, false).await?;
    info!(account_id, "Restored account");
    Ok(updated)
}

/// Permanently deletes a soft-deleted account and every transaction on it.
///
/// `confirm_name` must match the account's name. Transfers touching the
/// account lose their counterpart on the other account as well. Returns the
/// ids of every deleted transaction.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn hard_delete_account(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    account_id: i64,
    confirm_name: &str,
) -> Result<Vec<i64>> {
    scope.require(Operation::HardDeleteAccount)?;

    let txn = db.begin().await?;
    let existing = find_scoped(&txn, scope, account_id).await?;
    if !existing.is_deleted {
        return Err(Error::conflict(format!(
            "account '{}' must be soft-deleted first",
            existing.name
        )));
    }
    if existing.name != confirm_name {
        return Err(Error::validation(format!(
            "confirmation '{confirm_name}' does not match account '{}'",
            existing.name
        )));
    }

    let transactions = Transaction::find()
        .filter(transaction::Column::AccountId.eq(account_id))
        .order_by_asc(transaction::Column::Id)
        .all(&txn)
        .await?;

    let mut deleted: HashSet<i64> = HashSet::new();
    let mut order = Vec::with_capacity(transactions.len());
    for model in transactions {
        if deleted.contains(&model.id) {
            continue;
        }
        for id in ledger::remove_transaction(&txn, model).await? {
            if deleted.insert(id) {
                order.push(id);
            }
        }
    }

    Account::delete_by_id(account_id).exec(&txn).await?;
    txn.commit().await?;

    info!(account_id, transactions = order.len(), "Hard-deleted account");
    Ok(order)
}
