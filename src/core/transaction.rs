//! Transaction business logic - Handles all transaction-related operations.
//!
//! Every write follows the same pipeline: clearance check, validation, name
//! resolution, then one atomic ledger unit. Validation and resolution finish
//! before the store transaction opens, so a rejected request never writes.
//! Transfers are written, updated and deleted as a pair.

use crate::{
    core::{
        clearance::{BudgetScope, Operation},
        ledger::{self, TransactionRecord},
        month::Month,
        resolver::{self, NameResolver},
        validator::{self, TransactionRequest},
    },
    entities::{Transaction, transaction},
    errors::Result,
};
use sea_orm::{QueryOrder, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// Optional filters for [`list_transactions`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionFilter {
    /// Only transactions on this account
    pub account_id: Option<i64>,
    /// Only transactions dated in this month
    pub month: Option<Month>,
}

/// Logs a new transaction, creating and linking the counterpart for transfers.
///
/// The request is validated and every name in it resolved before anything is
/// written. The type comes from the amounts: positive splits make a deposit
/// and negative ones a withdrawal, and a transfer request becomes
/// TRANSFER_TO or TRANSFER_FROM by the sign of its `TRANSFER AMOUNT`. Mixed
/// signs are rejected and zero amounts dropped.
///
/// For a transfer, the counterpart lands on the other account with negated
/// splits and the opposite transfer type. Both rows, their splits and the
/// link commit together or not at all.
///
/// # Arguments
/// * `resolver` - Looks up account, category and payee names in the budget
/// * `scope` - Caller's clearance in the budget; CONTRIBUTOR or above
/// * `request` - Raw transaction as submitted, amounts keyed by category name
#[instrument(skip(db, resolver, request), fields(budget_id = scope.budget_id()))]
pub async fn log_transaction<R>(
    db: &DatabaseConnection,
    resolver: &R,
    scope: &BudgetScope,
    request: TransactionRequest,
) -> Result<TransactionRecord>
where
    R: NameResolver,
{
    scope.require(Operation::LogTransaction)?;
    let validated = validator::validate(request)?;
    let resolved = resolver::resolve_transaction(resolver, scope, validated).await?;

    let txn = db.begin().await?;
    let record = ledger::write_transaction(&txn, scope, &resolved).await?;
    txn.commit().await?;

    info!(
        transaction_id = record.transaction.id,
        transaction_type = ?record.transaction.transaction_type,
        total = record.total(),
        "Logged transaction"
    );
    Ok(record)
}

/// Replaces the contents of an existing transaction.
///
/// The request goes through the same validation and resolution as
/// [`log_transaction`]. A transaction can never switch between transfer and
/// non-transfer. Splits are rewritten only when the new set differs from the
/// stored one.
///
/// Updating either leg of a transfer rewrites its counterpart in the same
/// store transaction, keeping the two legs mirrored.
///
/// # Arguments
/// * `resolver` - Looks up account, category and payee names in the budget
/// * `scope` - Caller's clearance in the budget; CONTRIBUTOR or above
/// * `transaction_id` - Transaction to replace, in the scope's budget
/// * `request` - Full replacement contents
#[instrument(skip(db, resolver, request), fields(budget_id = scope.budget_id()))]
pub async fn update_transaction<R>(
    db: &DatabaseConnection,
    resolver: &R,
    scope: &BudgetScope,
    transaction_id: i64,
    request: TransactionRequest,
) -> Result<TransactionRecord>
where
    R: NameResolver,
{
    scope.require(Operation::LogTransaction)?;
    let validated = validator::validate(request)?;
    let resolved = resolver::resolve_transaction(resolver, scope, validated).await?;

    let txn = db.begin().await?;
    let existing = ledger::find_scoped(&txn, scope, transaction_id).await?;
    let record = ledger::rewrite_transaction(&txn, existing, &resolved).await?;
    txn.commit().await?;

    info!(transaction_id, total = record.total(), "Updated transaction");
    Ok(record)
}

/// Deletes a transaction; deleting either leg of a transfer deletes both.
///
/// Returns the ids of every deleted transaction.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn delete_transaction(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    transaction_id: i64,
) -> Result<Vec<i64>> {
    scope.require(Operation::LogTransaction)?;

    let txn = db.begin().await?;
    let existing = ledger::find_scoped(&txn, scope, transaction_id).await?;
    let deleted = ledger::remove_transaction(&txn, existing).await?;
    txn.commit().await?;

    info!(?deleted, "Deleted transaction");
    Ok(deleted)
}

/// Retrieves a transaction with its splits and transfer link.
pub async fn get_transaction(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    transaction_id: i64,
) -> Result<TransactionRecord> {
    scope.require(Operation::ViewBudget)?;
    let model = ledger::find_scoped(db, scope, transaction_id).await?;
    ledger::load_record(db, model).await
}

/// Lists the budget's transactions, newest first.
pub async fn list_transactions(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    filter: TransactionFilter,
) -> Result<Vec<transaction::Model>> {
    scope.require(Operation::ViewBudget)?;

    let mut query = Transaction::find().filter(transaction::Column::BudgetId.eq(scope.budget_id()));
    if let Some(account_id) = filter.account_id {
        query = query.filter(transaction::Column::AccountId.eq(account_id));
    }
    if let Some(month) = filter.month {
        query = query
            .filter(transaction::Column::Date.gte(month.first_day()))
            .filter(transaction::Column::Date.lt(month.next()?.first_day()));
    }

    query
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
