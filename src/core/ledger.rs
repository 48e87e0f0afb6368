//! Ledger writer and transfer linker.
//!
//! These functions perform the multi-row writes behind every transaction
//! operation. They take any [`ConnectionTrait`] so callers run them inside a
//! store transaction; the caller owns `begin`/`commit`, and an early return
//! drops the open transaction, which rolls every row back.

use crate::{
    core::{
        clearance::BudgetScope,
        resolver::{ResolvedSplit, ResolvedTransaction},
    },
    entities::{
        Transaction, TransactionSplit, TransactionType, Transfer, transaction, transaction_split,
        transfer,
    },
    errors::{Error, ResourceKind, Result},
};
use sea_orm::{Condition, QueryOrder, Set, prelude::*};
use serde::Serialize;
use tracing::debug;

/// A transaction with its splits and, for transfers, the linked counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    /// The transaction row
    pub transaction: transaction::Model,
    /// Its splits
    pub splits: Vec<transaction_split::Model>,
    /// The other leg, when this is a transfer
    pub transfer: Option<TransferLeg>,
}

/// The linked side of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferLeg {
    /// Link row naming the from and to sides
    pub link: transfer::Model,
    /// The counterpart transaction
    pub counterpart: transaction::Model,
    /// The counterpart's splits
    pub counterpart_splits: Vec<transaction_split::Model>,
}

impl TransactionRecord {
    /// Sum of this transaction's split amounts.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.splits
            .iter()
            .fold(0, |total: i64, split| total.saturating_add(split.amount))
    }
}

/// Loads a transaction by id and checks it belongs to the scope's budget.
pub(crate) async fn find_scoped<C>(
    conn: &C,
    scope: &BudgetScope,
    transaction_id: i64,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    let model = Transaction::find_by_id(transaction_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found(ResourceKind::Transaction, transaction_id))?;

    if model.budget_id != scope.budget_id() {
        return Err(Error::forbidden("transaction belongs to another budget"));
    }
    Ok(model)
}

/// Splits of one transaction, in insertion order.
pub(crate) async fn load_splits<C>(
    conn: &C,
    transaction_id: i64,
) -> Result<Vec<transaction_split::Model>>
where
    C: ConnectionTrait,
{
    TransactionSplit::find()
        .filter(transaction_split::Column::TransactionId.eq(transaction_id))
        .order_by_asc(transaction_split::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// The transfer link naming `transaction_id` on either side, if any.
pub(crate) async fn find_link<C>(conn: &C, transaction_id: i64) -> Result<Option<transfer::Model>>
where
    C: ConnectionTrait,
{
    Transfer::find()
        .filter(
            Condition::any()
                .add(transfer::Column::FromTransactionId.eq(transaction_id))
                .add(transfer::Column::ToTransactionId.eq(transaction_id)),
        )
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Fails unless a transfer leg has a link and a plain transaction has none.
async fn expect_link<C>(conn: &C, model: &transaction::Model) -> Result<Option<transfer::Model>>
where
    C: ConnectionTrait,
{
    let link = find_link(conn, model.id).await?;
    match (model.transaction_type.is_transfer(), link) {
        (true, Some(link)) => Ok(Some(link)),
        (false, None) => Ok(None),
        (true, None) => Err(Error::Integrity {
            message: format!("transfer transaction {} has no link", model.id),
        }),
        (false, Some(_)) => Err(Error::Integrity {
            message: format!("non-transfer transaction {} is linked", model.id),
        }),
    }
}

/// Assembles the full record for a stored transaction.
pub(crate) async fn load_record<C>(conn: &C, model: transaction::Model) -> Result<TransactionRecord>
where
    C: ConnectionTrait,
{
    let splits = load_splits(conn, model.id).await?;
    let transfer = match expect_link(conn, &model).await? {
        Some(link) => {
            let counterpart_id = link.counterpart_of(model.id);
            let counterpart = Transaction::find_by_id(counterpart_id)
                .one(conn)
                .await?
                .ok_or_else(|| Error::Integrity {
                    message: format!("transfer counterpart {counterpart_id} is missing"),
                })?;
            let counterpart_splits = load_splits(conn, counterpart_id).await?;
            Some(TransferLeg {
                link,
                counterpart,
                counterpart_splits,
            })
        }
        None => None,
    };

    Ok(TransactionRecord {
        transaction: model,
        splits,
        transfer,
    })
}

/// Inserts one split per nonzero amount, negating when writing a counterpart.
async fn insert_splits<C>(
    conn: &C,
    transaction_id: i64,
    splits: &[ResolvedSplit],
    negate: bool,
) -> Result<Vec<transaction_split::Model>>
where
    C: ConnectionTrait,
{
    let mut inserted = Vec::with_capacity(splits.len());
    for split in splits.iter().filter(|split| split.amount != 0) {
        let amount = if negate {
            split
                .amount
                .checked_neg()
                .ok_or_else(|| Error::validation("amount cannot be negated"))?
        } else {
            split.amount
        };
        let model = transaction_split::ActiveModel {
            transaction_id: Set(transaction_id),
            category_id: Set(split.category_id),
            amount: Set(amount),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        inserted.push(model);
    }

    if inserted.is_empty() {
        return Err(Error::validation("no non-zero amount"));
    }
    Ok(inserted)
}

/// Inserts one transaction row.
async fn insert_leg<C>(
    conn: &C,
    scope: &BudgetScope,
    resolved: &ResolvedTransaction,
    account_id: i64,
    transaction_type: TransactionType,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    transaction::ActiveModel {
        budget_id: Set(scope.budget_id()),
        account_id: Set(account_id),
        payee_id: Set(resolved.payee_id),
        transaction_type: Set(transaction_type),
        date: Set(resolved.date),
        cleared: Set(resolved.cleared),
        notes: Set(resolved.notes.clone()),
        logger_id: Set(scope.caller().user_id()),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

/// Orders two transfer legs by type: `(from, to)`.
fn order_legs<'a>(
    a: &'a transaction::Model,
    b: &'a transaction::Model,
) -> Result<(&'a transaction::Model, &'a transaction::Model)> {
    match (a.transaction_type, b.transaction_type) {
        (TransactionType::TransferFrom, TransactionType::TransferTo) => Ok((a, b)),
        (TransactionType::TransferTo, TransactionType::TransferFrom) => Ok((b, a)),
        (left, right) => Err(Error::Integrity {
            message: format!("cannot link {left:?} with {right:?} as a transfer"),
        }),
    }
}

/// Inserts the link between two transfer legs, oriented by their types.
async fn link_transfer<C>(
    conn: &C,
    a: &transaction::Model,
    b: &transaction::Model,
) -> Result<transfer::Model>
where
    C: ConnectionTrait,
{
    let (from, to) = order_legs(a, b)?;
    transfer::ActiveModel {
        from_transaction_id: Set(from.id),
        to_transaction_id: Set(to.id),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

/// Writes a new transaction, and for transfers its linked counterpart.
pub(crate) async fn write_transaction<C>(
    conn: &C,
    scope: &BudgetScope,
    resolved: &ResolvedTransaction,
) -> Result<TransactionRecord>
where
    C: ConnectionTrait,
{
    let model = insert_leg(
        conn,
        scope,
        resolved,
        resolved.account_id,
        resolved.transaction_type,
    )
    .await?;
    let splits = insert_splits(conn, model.id, &resolved.splits, false).await?;

    let transfer = if resolved.is_transfer() {
        let counterpart_account = resolved.transfer_account_id.ok_or_else(|| {
            Error::validation("a transfer needs a transfer account")
        })?;
        let counterpart = insert_leg(
            conn,
            scope,
            resolved,
            counterpart_account,
            resolved.transaction_type.invert(),
        )
        .await?;
        let counterpart_splits = insert_splits(conn, counterpart.id, &resolved.splits, true).await?;
        let link = link_transfer(conn, &model, &counterpart).await?;
        debug!(
            from = link.from_transaction_id,
            to = link.to_transaction_id,
            "Linked transfer legs"
        );
        Some(TransferLeg {
            link,
            counterpart,
            counterpart_splits,
        })
    } else {
        None
    };

    Ok(TransactionRecord {
        transaction: model,
        splits,
        transfer,
    })
}

/// True if the stored splits already match the requested ones exactly.
fn same_splits(stored: &[transaction_split::Model], requested: &[ResolvedSplit]) -> bool {
    let mut stored: Vec<(Option<i64>, i64)> = stored
        .iter()
        .map(|split| (split.category_id, split.amount))
        .collect();
    let mut requested: Vec<(Option<i64>, i64)> = requested
        .iter()
        .filter(|split| split.amount != 0)
        .map(|split| (split.category_id, split.amount))
        .collect();
    stored.sort_unstable();
    requested.sort_unstable();
    stored == requested
}

/// Deletes every split of a transaction.
async fn delete_splits<C>(conn: &C, transaction_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    TransactionSplit::delete_many()
        .filter(transaction_split::Column::TransactionId.eq(transaction_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Updates the header fields of one leg.
async fn update_leg<C>(
    conn: &C,
    existing: transaction::Model,
    resolved: &ResolvedTransaction,
    account_id: i64,
    transaction_type: TransactionType,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    let mut active: transaction::ActiveModel = existing.into();
    active.account_id = Set(account_id);
    active.payee_id = Set(resolved.payee_id);
    active.transaction_type = Set(transaction_type);
    active.date = Set(resolved.date);
    active.cleared = Set(resolved.cleared);
    active.notes = Set(resolved.notes.clone());
    active.update(conn).await.map_err(Into::into)
}

/// Rewrites an existing transaction from a new request.
///
/// Splits are replaced unless the requested set is identical to the stored
/// one. For transfers the counterpart is rewritten with the inverted type and
/// negated splits, and the link is re-oriented if the legs swapped roles.
pub(crate) async fn rewrite_transaction<C>(
    conn: &C,
    existing: transaction::Model,
    resolved: &ResolvedTransaction,
) -> Result<TransactionRecord>
where
    C: ConnectionTrait,
{
    if existing.transaction_type.is_transfer() != resolved.is_transfer() {
        return Err(Error::validation(
            "a transaction cannot change between transfer and non-transfer",
        ));
    }

    let link = expect_link(conn, &existing).await?;
    let stored_splits = load_splits(conn, existing.id).await?;
    let replace_splits = !same_splits(&stored_splits, &resolved.splits);

    let model = update_leg(
        conn,
        existing,
        resolved,
        resolved.account_id,
        resolved.transaction_type,
    )
    .await?;
    let splits = if replace_splits {
        delete_splits(conn, model.id).await?;
        insert_splits(conn, model.id, &resolved.splits, false).await?
    } else {
        stored_splits
    };

    let transfer = match link {
        Some(link) => {
            let counterpart_account = resolved.transfer_account_id.ok_or_else(|| {
                Error::validation("a transfer needs a transfer account")
            })?;
            let counterpart_id = link.counterpart_of(model.id);
            let counterpart = Transaction::find_by_id(counterpart_id)
                .one(conn)
                .await?
                .ok_or_else(|| Error::Integrity {
                    message: format!("transfer counterpart {counterpart_id} is missing"),
                })?;
            let counterpart = update_leg(
                conn,
                counterpart,
                resolved,
                counterpart_account,
                resolved.transaction_type.invert(),
            )
            .await?;
            let counterpart_splits = if replace_splits {
                delete_splits(conn, counterpart.id).await?;
                insert_splits(conn, counterpart.id, &resolved.splits, true).await?
            } else {
                load_splits(conn, counterpart.id).await?
            };

            let (from, to) = order_legs(&model, &counterpart)?;
            let link = if link.from_transaction_id == from.id {
                link
            } else {
                let mut active: transfer::ActiveModel = link.into();
                active.from_transaction_id = Set(from.id);
                active.to_transaction_id = Set(to.id);
                active.update(conn).await?
            };

            Some(TransferLeg {
                link,
                counterpart,
                counterpart_splits,
            })
        }
        None => None,
    };

    Ok(TransactionRecord {
        transaction: model,
        splits,
        transfer,
    })
}

/// Deletes a transaction with its splits; transfers take their counterpart
/// and link with them. Returns the ids of every deleted transaction.
pub(crate) async fn remove_transaction<C>(
    conn: &C,
    existing: transaction::Model,
) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    let mut doomed = vec![existing.id];
    if let Some(link) = expect_link(conn, &existing).await? {
        doomed.push(link.counterpart_of(existing.id));
        Transfer::delete_by_id(link.id).exec(conn).await?;
    }

    TransactionSplit::delete_many()
        .filter(transaction_split::Column::TransactionId.is_in(doomed.clone()))
        .exec(conn)
        .await?;
    Transaction::delete_many()
        .filter(transaction::Column::Id.is_in(doomed.clone()))
        .exec(conn)
        .await?;

    debug!(ids = ?doomed, "Removed transactions");
    Ok(doomed)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{PaginatorTrait, TransactionTrait};

    fn resolved(
        account_id: i64,
        transfer_account_id: Option<i64>,
        splits: &[(Option<i64>, i64)],
    ) -> ResolvedTransaction {
        let positive = splits.iter().any(|(_, amount)| *amount > 0);
        ResolvedTransaction {
            transaction_type: TransactionType::infer(positive, transfer_account_id.is_some()),
            account_id,
            transfer_account_id,
            payee_id: None,
            date: test_date(2024, 3, 15),
            notes: "ledger test".to_string(),
            cleared: false,
            splits: splits
                .iter()
                .map(|(category_id, amount)| ResolvedSplit {
                    category_id: *category_id,
                    amount: *amount,
                })
                .collect(),
        }
    }

    #[test]
    fn test_same_splits_ignores_order() {
        let stored = vec![
            transaction_split::Model {
                id: 1,
                transaction_id: 1,
                category_id: Some(1),
                amount: -5,
            },
            transaction_split::Model {
                id: 2,
                transaction_id: 1,
                category_id: None,
                amount: -7,
            },
        ];
        let requested = [
            ResolvedSplit {
                category_id: None,
                amount: -7,
            },
            ResolvedSplit {
                category_id: Some(1),
                amount: -5,
            },
        ];
        assert!(same_splits(&stored, &requested));
        assert!(!same_splits(&stored, &requested[..1]));
    }

    #[tokio::test]
    async fn test_write_transfer_orients_link_by_type() -> Result<()> {
        let (db, scope) = setup_with_budget().await?;
        let checking = create_test_account(&db, &scope, "Checking").await?;
        let savings = create_test_account(&db, &scope, "Savings").await?;

        // Logged from the receiving side: the new row is TRANSFER_TO
        let txn = db.begin().await?;
        let record = write_transaction(
            &txn,
            &scope,
            &resolved(savings.id, Some(checking.id), &[(None, 2500)]),
        )
        .await?;
        txn.commit().await?;

        let leg = record.transfer.unwrap();
        assert_eq!(record.transaction.transaction_type, TransactionType::TransferTo);
        assert_eq!(leg.counterpart.transaction_type, TransactionType::TransferFrom);
        assert_eq!(leg.link.to_transaction_id, record.transaction.id);
        assert_eq!(leg.link.from_transaction_id, leg.counterpart.id);
        assert_eq!(leg.counterpart.account_id, checking.id);
        assert_eq!(leg.counterpart_splits[0].amount, -2500);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back_everything() -> Result<()> {
        let (db, scope) = setup_with_budget().await?;
        let checking = create_test_account(&db, &scope, "Checking").await?;

        // The transaction row is inserted before the empty split set is rejected
        let txn = db.begin().await?;
        let result = write_transaction(&txn, &scope, &resolved(checking.id, None, &[])).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        txn.rollback().await?;

        assert_eq!(Transaction::find().count(&db).await?, 0);
        assert_eq!(TransactionSplit::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_counterpart_rolls_back_first_leg() -> Result<()> {
        let (db, scope) = setup_with_budget().await?;
        let checking = create_test_account(&db, &scope, "Checking").await?;

        // A transfer-typed request without a target fails after the first leg is written
        let mut request = resolved(checking.id, None, &[(None, -100)]);
        request.transaction_type = TransactionType::TransferFrom;

        let txn = db.begin().await?;
        let result = write_transaction(&txn, &scope, &request).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        txn.rollback().await?;

        assert_eq!(Transaction::find().count(&db).await?, 0);
        assert_eq!(TransactionSplit::find().count(&db).await?, 0);
        assert_eq!(Transfer::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_unnegatable_counterpart_amount_is_rejected() -> Result<()> {
        let (db, scope) = setup_with_budget().await?;
        let checking = create_test_account(&db, &scope, "Checking").await?;
        let savings = create_test_account(&db, &scope, "Savings").await?;

        let txn = db.begin().await?;
        let result = write_transaction(
            &txn,
            &scope,
            &resolved(checking.id, Some(savings.id), &[(None, i64::MIN)]),
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        txn.rollback().await?;

        assert_eq!(Transaction::find().count(&db).await?, 0);
        assert_eq!(TransactionSplit::find().count(&db).await?, 0);
        Ok(())
    }
}
