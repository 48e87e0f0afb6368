//! Name resolution - maps human-readable names to identifiers within a budget.
//!
//! The ledger only ever sees identifiers. [`NameResolver`] is the seam for the
//! lookup collaborator; [`StoreResolver`] answers from the ledger store itself.

use crate::{
    core::{
        clearance::BudgetScope,
        validator::{TRANSFER_AMOUNT, UNCATEGORIZED, ValidatedTransaction},
    },
    entities::{Account, Category, Payee, TransactionType, account, category, payee},
    errors::{Error, ResourceKind, Result},
};
use chrono::NaiveDate;
use sea_orm::prelude::*;
use tracing::debug;

/// Looks up budget-scoped resources by name.
#[allow(async_fn_in_trait)]
pub trait NameResolver {
    /// Returns the id of the named resource, or [`Error::NotFound`].
    async fn resolve(&self, scope: &BudgetScope, kind: ResourceKind, name: &str) -> Result<i64>;
}

/// Resolves names against the ledger store.
///
/// Soft-deleted accounts and retired payees do not resolve.
#[derive(Debug, Clone, Copy)]
pub struct StoreResolver<'a, C> {
    db: &'a C,
}

impl<'a, C> StoreResolver<'a, C>
where
    C: ConnectionTrait,
{
    /// Creates a resolver reading from `db`.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }
}

impl<C> NameResolver for StoreResolver<'_, C>
where
    C: ConnectionTrait,
{
    async fn resolve(&self, scope: &BudgetScope, kind: ResourceKind, name: &str) -> Result<i64> {
        let budget_id = scope.budget_id();
        let found = match kind {
            ResourceKind::Account => Account::find()
                .filter(account::Column::BudgetId.eq(budget_id))
                .filter(account::Column::Name.eq(name))
                .filter(account::Column::IsDeleted.eq(false))
                .one(self.db)
                .await?
                .map(|model| model.id),
            ResourceKind::Payee => Payee::find()
                .filter(payee::Column::BudgetId.eq(budget_id))
                .filter(payee::Column::Name.eq(name))
                .filter(payee::Column::IsDeleted.eq(false))
                .one(self.db)
                .await?
                .map(|model| model.id),
            ResourceKind::Category => Category::find()
                .filter(category::Column::BudgetId.eq(budget_id))
                .filter(category::Column::Name.eq(name))
                .one(self.db)
                .await?
                .map(|model| model.id),
            other => {
                return Err(Error::validation(format!("{other} names cannot be resolved")));
            }
        };

        debug!(budget_id, %kind, name, id = ?found, "Resolved name");
        found.ok_or_else(|| Error::not_found(kind, name))
    }
}

/// One split with its category resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSplit {
    /// Category id, `None` for uncategorized and transfer amounts
    pub category_id: Option<i64>,
    /// Nonzero signed cents
    pub amount: i64,
}

/// A validated transaction with every name replaced by an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTransaction {
    /// Inferred type
    pub transaction_type: TransactionType,
    /// Account the money moves on
    pub account_id: i64,
    /// Counterpart account for transfers
    pub transfer_account_id: Option<i64>,
    /// Payee, if one was named
    pub payee_id: Option<i64>,
    /// Booking date
    pub date: NaiveDate,
    /// Notes
    pub notes: String,
    /// Cleared flag
    pub cleared: bool,
    /// Splits in category-name order
    pub splits: Vec<ResolvedSplit>,
}

impl ResolvedTransaction {
    /// True if this is one leg of a transfer.
    #[must_use]
    pub const fn is_transfer(&self) -> bool {
        self.transaction_type.is_transfer()
    }
}

/// True if the split key is a sentinel that never names a category.
fn is_uncategorized_key(name: &str, transaction_type: TransactionType) -> bool {
    name == TRANSFER_AMOUNT
        || (transaction_type == TransactionType::Deposit && name == UNCATEGORIZED)
}

/// Resolves every name a validated transaction references.
///
/// `TRANSFER AMOUNT` never names a category, and `UNCATEGORIZED` does not when
/// the transaction is a deposit; any other key must name a category.
pub async fn resolve_transaction<R>(
    resolver: &R,
    scope: &BudgetScope,
    validated: ValidatedTransaction,
) -> Result<ResolvedTransaction>
where
    R: NameResolver,
{
    let account_id = resolver
        .resolve(scope, ResourceKind::Account, &validated.account)
        .await?;

    let transfer_account_id = match validated.transfer_account.as_deref() {
        Some(name) => {
            let id = resolver.resolve(scope, ResourceKind::Account, name).await?;
            if id == account_id {
                return Err(Error::validation(
                    "a transfer must move money between two different accounts",
                ));
            }
            Some(id)
        }
        None => None,
    };

    let payee_id = match validated.payee.as_deref() {
        Some(name) => Some(resolver.resolve(scope, ResourceKind::Payee, name).await?),
        None => None,
    };

    let mut splits = Vec::with_capacity(validated.amounts.len());
    for (name, amount) in validated.amounts {
        let category_id = if is_uncategorized_key(&name, validated.transaction_type) {
            None
        } else {
            Some(resolver.resolve(scope, ResourceKind::Category, &name).await?)
        };
        splits.push(ResolvedSplit {
            category_id,
            amount,
        });
    }

    Ok(ResolvedTransaction {
        transaction_type: validated.transaction_type,
        account_id,
        transfer_account_id,
        payee_id,
        date: validated.date,
        notes: validated.notes,
        cleared: validated.cleared,
        splits,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::validator::{self, TransactionRequest};
    use crate::test_utils::*;

    fn plain(amounts: &[(&str, i64)]) -> ValidatedTransaction {
        validator::validate(TransactionRequest {
            account: "Checking".to_string(),
            date: "2024-03-15".to_string(),
            amounts: amounts
                .iter()
                .map(|(name, amount)| ((*name).to_string(), *amount))
                .collect(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_store_resolver_finds_names_in_scope() -> Result<()> {
        let (db, scope) = setup_with_budget().await?;
        let checking = create_test_account(&db, &scope, "Checking").await?;
        let groceries = create_test_category(&db, &scope, "Groceries").await?;

        let resolver = StoreResolver::new(&db);
        assert_eq!(
            resolver.resolve(&scope, ResourceKind::Account, "Checking").await?,
            checking.id
        );
        assert_eq!(
            resolver.resolve(&scope, ResourceKind::Category, "Groceries").await?,
            groceries.id
        );

        let missing = resolver.resolve(&scope, ResourceKind::Payee, "Nobody").await;
        assert!(matches!(
            missing,
            Err(Error::NotFound { kind: ResourceKind::Payee, .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_store_resolver_ignores_other_budgets() -> Result<()> {
        let (db, scope) = setup_with_budget().await?;
        let other_scope = create_test_budget(&db, OTHER_USER, "Other").await?;
        create_test_account(&db, &other_scope, "Checking").await?;

        let resolver = StoreResolver::new(&db);
        let result = resolver.resolve(&scope, ResourceKind::Account, "Checking").await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_transaction_maps_sentinels() -> Result<()> {
        let (db, scope) = setup_with_budget().await?;
        create_test_account(&db, &scope, "Checking").await?;
        let groceries = create_test_category(&db, &scope, "Groceries").await?;
        let resolver = StoreResolver::new(&db);

        let resolved = resolve_transaction(
            &resolver,
            &scope,
            plain(&[("Groceries", -300), (TRANSFER_AMOUNT, -20)]),
        )
        .await?;
        assert_eq!(
            resolved.splits,
            vec![
                ResolvedSplit {
                    category_id: Some(groceries.id),
                    amount: -300
                },
                ResolvedSplit {
                    category_id: None,
                    amount: -20
                },
            ]
        );

        // UNCATEGORIZED only passes through on deposits
        let spend = resolve_transaction(&resolver, &scope, plain(&[(UNCATEGORIZED, -5)])).await;
        assert!(matches!(
            spend,
            Err(Error::NotFound { kind: ResourceKind::Category, .. })
        ));
        let deposit = resolve_transaction(&resolver, &scope, plain(&[(UNCATEGORIZED, 5)])).await?;
        assert_eq!(deposit.splits[0].category_id, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_transaction_rejects_self_transfer() -> Result<()> {
        let (db, scope) = setup_with_budget().await?;
        create_test_account(&db, &scope, "Checking").await?;
        let resolver = StoreResolver::new(&db);

        let mut validated = plain(&[(TRANSFER_AMOUNT, -5)]);
        validated.transaction_type = TransactionType::TransferFrom;
        validated.transfer_account = Some("Checking".to_string());

        let result = resolve_transaction(&resolver, &scope, validated).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }
}
