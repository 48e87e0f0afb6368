//! Envelope accounting - assignments and the values derived from the ledger.
//!
//! Nothing here is stored except assignments. `activity`, `balance` and
//! `capital` are recomputed from splits with aggregate queries, so they are
//! always consistent with the ledger.
//!
//! - `activity(c, m)`: sum of category `c` splits on transactions dated in `m`
//! - `balance(c, m)`: every assignment and split of `c` up to the end of `m`
//! - `capital`: sum of every split on an account or in a budget
//! - `assignable(m)`: budget capital minus every category balance at `m`

use crate::{
    core::{
        category,
        clearance::{BudgetScope, Operation},
        month::Month,
        validator::{MAX_AMOUNT, check_amounts},
    },
    entities::{
        Category, MonthlyAssignment, Transaction, TransactionSplit, category as category_entity,
        monthly_assignment, transaction, transaction_split,
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, QuerySelect, Select, Set, prelude::*, sea_query::OnConflict};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, instrument};

/// One category's figures for a month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryMonth {
    /// Category id
    pub category_id: i64,
    /// Category name
    pub name: String,
    /// Owning group, if any
    pub group_id: Option<i64>,
    /// Money assigned this month
    pub assigned: i64,
    /// Net split amounts this month
    pub activity: i64,
    /// Running balance at the end of the month
    pub balance: i64,
}

/// Every category's figures for a month plus the budget-level totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthReport {
    /// Reported month
    pub month: Month,
    /// Categories ordered by name
    pub categories: Vec<CategoryMonth>,
    /// Budget capital
    pub capital: i64,
    /// Money not yet held by any category
    pub assignable: i64,
}

/// Splits joined to their transactions, selecting only `SUM(amount)`.
fn split_total() -> Select<TransactionSplit> {
    TransactionSplit::find()
        .select_only()
        .column_as(
            Expr::col((TransactionSplit, transaction_split::Column::Amount)).sum(),
            "total",
        )
        .inner_join(Transaction)
}

/// Assignments joined to their categories, selecting only `SUM(amount)`.
fn assignment_total() -> Select<MonthlyAssignment> {
    MonthlyAssignment::find()
        .select_only()
        .column_as(
            Expr::col((MonthlyAssignment, monthly_assignment::Column::Amount)).sum(),
            "total",
        )
        .inner_join(Category)
}

/// Runs a single-sum query; an empty set sums to zero.
async fn sum_of<C, E>(db: &C, query: Select<E>) -> Result<i64>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let total = query.into_tuple::<Option<i64>>().one(db).await?;
    Ok(total.flatten().unwrap_or(0))
}

/// Adds `amount` to what category `category_id` holds for `month`.
///
/// Assignments are additive: a second call for the same month increases the
/// stored amount rather than replacing it. Negative amounts move money back
/// out. The increment happens in a single upsert, so concurrent assigns to
/// the same month never lose an update.
///
/// Returns the month's new assigned total.
///
/// # Arguments
/// * `scope` - Caller's clearance in the budget; MANAGER or above
/// * `category_id` - Category receiving the money, in the scope's budget
/// * `month` - Month the assignment counts towards
/// * `amount` - Cents to add; non-zero and within [`MAX_AMOUNT`] either way
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn assign(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    category_id: i64,
    month: Month,
    amount: i64,
) -> Result<i64> {
    scope.require(Operation::AssignMoney)?;
    if amount == 0 {
        return Err(Error::validation("assignment amount must be non-zero"));
    }
    check_amounts([&amount])?;
    category::find_scoped(db, scope, category_id).await?;

    let row = monthly_assignment::ActiveModel {
        category_id: Set(category_id),
        month: Set(month.first_day()),
        amount: Set(amount),
    };
    MonthlyAssignment::insert(row)
        .on_conflict(
            OnConflict::columns([
                monthly_assignment::Column::CategoryId,
                monthly_assignment::Column::Month,
            ])
            .value(
                monthly_assignment::Column::Amount,
                Expr::col(monthly_assignment::Column::Amount).add(amount),
            )
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    let total = assigned(db, scope, category_id, month).await?;
    info!(category_id, %month, amount, total, "Assigned money");
    Ok(total)
}

/// Money assigned to a category in one month.
pub async fn assigned(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    category_id: i64,
    month: Month,
) -> Result<i64> {
    scope.require(Operation::ViewReports)?;
    category::find_scoped(db, scope, category_id).await?;

    let row = MonthlyAssignment::find_by_id((category_id, month.first_day()))
        .one(db)
        .await?;
    Ok(row.map_or(0, |row| row.amount))
}

/// Net split amounts of a category on transactions dated in `month`.
pub async fn activity(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    category_id: i64,
    month: Month,
) -> Result<i64> {
    scope.require(Operation::ViewReports)?;
    category::find_scoped(db, scope, category_id).await?;

    let query = split_total()
        .filter(transaction_split::Column::CategoryId.eq(category_id))
        .filter(transaction::Column::Date.gte(month.first_day()))
        .filter(transaction::Column::Date.lt(month.next()?.first_day()));
    sum_of(db, query).await
}

/// A category's running balance at the end of `month`.
///
/// Equal to the previous month's balance plus this month's assigned and
/// activity, seeded at zero. Overspending yields a negative balance.
pub async fn balance(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    category_id: i64,
    month: Month,
) -> Result<i64> {
    scope.require(Operation::ViewReports)?;
    category::find_scoped(db, scope, category_id).await?;

    let assigned = assignment_total()
        .filter(monthly_assignment::Column::CategoryId.eq(category_id))
        .filter(monthly_assignment::Column::Month.lte(month.first_day()));
    let spent = split_total()
        .filter(transaction_split::Column::CategoryId.eq(category_id))
        .filter(transaction::Column::Date.lt(month.next()?.first_day()));

    Ok(sum_of(db, assigned).await? + sum_of(db, spent).await?)
}

/// Money on an account, cleared or not.
pub async fn account_capital(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    account_id: i64,
) -> Result<i64> {
    scope.require(Operation::ViewReports)?;
    crate::core::account::find_scoped(db, scope, account_id).await?;

    let query = split_total().filter(transaction::Column::AccountId.eq(account_id));
    sum_of(db, query).await
}

/// Money on an account counting only cleared transactions.
pub async fn account_cleared_capital(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    account_id: i64,
) -> Result<i64> {
    scope.require(Operation::ViewReports)?;
    crate::core::account::find_scoped(db, scope, account_id).await?;

    let query = split_total()
        .filter(transaction::Column::AccountId.eq(account_id))
        .filter(transaction::Column::Cleared.eq(true));
    sum_of(db, query).await
}

async fn capital_of<C>(db: &C, budget_id: i64) -> Result<i64>
where
    C: ConnectionTrait,
{
    sum_of(
        db,
        split_total().filter(transaction::Column::BudgetId.eq(budget_id)),
    )
    .await
}

/// Money across every account in the budget.
///
/// Transfers contribute zero: both legs are in the same budget.
pub async fn budget_capital(db: &DatabaseConnection, scope: &BudgetScope) -> Result<i64> {
    scope.require(Operation::ViewReports)?;
    capital_of(db, scope.budget_id()).await
}

/// Sums keyed by category id from a query grouped by category.
///
/// The grouping column is selected after the sum, so rows read as
/// `(sum, category_id)`.
async fn grouped<C, E>(db: &C, query: Select<E>) -> Result<HashMap<i64, i64>>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let rows = query.into_tuple::<(i64, i64)>().all(db).await?;
    Ok(rows
        .into_iter()
        .map(|(total, category_id)| (category_id, total))
        .collect())
}

/// Every category balance at `month`, keyed by category id.
async fn balances_at<C>(db: &C, budget_id: i64, month: Month) -> Result<HashMap<i64, i64>>
where
    C: ConnectionTrait,
{
    let end = month.next()?.first_day();
    let assigned = grouped(
        db,
        assignment_total()
            .column(monthly_assignment::Column::CategoryId)
            .filter(category_entity::Column::BudgetId.eq(budget_id))
            .filter(monthly_assignment::Column::Month.lt(end))
            .group_by(monthly_assignment::Column::CategoryId),
    )
    .await?;
    let spent = grouped(
        db,
        split_total()
            .column(transaction_split::Column::CategoryId)
            .filter(transaction::Column::BudgetId.eq(budget_id))
            .filter(transaction_split::Column::CategoryId.is_not_null())
            .filter(transaction::Column::Date.lt(end))
            .group_by(transaction_split::Column::CategoryId),
    )
    .await?;

    let mut balances = assigned;
    for (category_id, amount) in spent {
        *balances.entry(category_id).or_insert(0) += amount;
    }
    Ok(balances)
}

/// Budget capital minus the money every category holds at `month`.
///
/// Negative when more has been assigned than the budget owns.
pub async fn assignable_money(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    month: Month,
) -> Result<i64> {
    scope.require(Operation::ViewReports)?;
    let capital = capital_of(db, scope.budget_id()).await?;
    let held: i64 = balances_at(db, scope.budget_id(), month)
        .await?
        .values()
        .sum();
    Ok(capital - held)
}

/// Builds the report for one month.
///
/// Lists every category of the budget by name with what it was assigned, what
/// it spent or received, and the balance it carries out of `month`. The
/// assignable figure is budget capital minus the sum of those balances.
///
/// All sums come from a few grouped queries rather than one query per
/// category.
///
/// # Arguments
/// * `scope` - Caller's clearance in the budget; VIEWER or above
/// * `month` - Month to report on(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn month_report(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    month: Month,
) -> Result<MonthReport> {
    scope.require(Operation::ViewReports)?;
    let budget_id = scope.budget_id();

    let categories = Category::find()
        .filter(category_entity::Column::BudgetId.eq(budget_id))
        .order_by_asc(category_entity::Column::Name)
        .all(db)
        .await?;

    let assigned = grouped(
        db,
        assignment_total()
            .column(monthly_assignment::Column::CategoryId)
            .filter(category_entity::Column::BudgetId.eq(budget_id))
            .filter(monthly_assignment::Column::Month.eq(month.first_day()))
            .group_by(monthly_assignment::Column::CategoryId),
    )
    .await?;
    let activity = grouped(
        db,
        split_total()
            .column(transaction_split::Column::CategoryId)
            .filter(transaction::Column::BudgetId.eq(budget_id))
            .filter(transaction_split::Column::CategoryId.is_not_null())
            .filter(transaction::Column::Date.gte(month.first_day()))
            .filter(transaction::Column::Date.lt(month.next()?.first_day()))
            .group_by(transaction_split::Column::CategoryId),
    )
    .await?;
    let balances = balances_at(db, budget_id, month).await?;

    let categories: Vec<CategoryMonth> = categories
        .into_iter()
        .map(|category| CategoryMonth {
            assigned: assigned.get(&category.id).copied().unwrap_or(0),
            activity: activity.get(&category.id).copied().unwrap_or(0),
            balance: balances.get(&category.id).copied().unwrap_or(0),
            category_id: category.id,
            name: category.name,
            group_id: category.group_id,
        })
        .collect();

    let capital = capital_of(db, budget_id).await?;
    let held: i64 = balances.values().sum();

    Ok(MonthReport {
        month,
        categories,
        capital,
        assignable: capital - held,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{
        budget,
        clearance::{self, Caller},
        resolver::StoreResolver,
        role::Role,
        transaction::log_transaction,
        validator::{TRANSFER_AMOUNT, UNCATEGORIZED},
    };
    use crate::test_utils::*;

    fn march() -> Month {
        Month::new(2024, 3).unwrap()
    }

    #[tokio::test]
    async fn test_assign_is_additive() -> Result<()> {
        let (db, scope) = setup_with_budget().await?;
        let groceries = create_test_category(&db, &scope, "Groceries").await?;

        assert_eq!(assign(&db, &scope, groceries.id, march(), 4000).await?, 4000);
        assert_eq!(assign(&db, &scope, groceries.id, march(), 1000).await?, 5000);
        assert_eq!(assign(&db, &scope, groceries.id, march(), -500).await?, 4500);
        assert_eq!(assigned(&db, &scope, groceries.id, march()).await?, 4500);

        // Another month is untouched
        let april = march().next()?;
        assert_eq!(assigned(&db, &scope, groceries.id, april).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_assign_rejects_zero_and_foreign_categories() -> Result<()> {
        let (db, scope) = setup_with_budget().await?;
        let groceries = create_test_category(&db, &scope, "Groceries").await?;

        let zero = assign(&db, &scope, groceries.id, march(), 0).await;
        assert!(matches!(zero, Err(Error::Validation { .. })));
        for amount in [i64::MIN, i64::MAX, MAX_AMOUNT + 1] {
            let huge = assign(&db, &scope, groceries.id, march(), amount).await;
            assert!(matches!(huge, Err(Error::Validation { .. })));
        }
        assert_eq!(assigned(&db, &scope, groceries.id, march()).await?, 0);

        let other = create_test_budget(&db, OTHER_USER, "Other").await?;
        let foreign = assign(&db, &other, groceries.id, march(), 100).await;
        assert!(matches!(foreign, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_contributor_cannot_assign() -> Result<()> {
        let (db, scope) = setup_with_budget().await?;
        let groceries = create_test_category(&db, &scope, "Groceries").await?;
        budget::add_member(&db, &scope, OTHER_USER, Role::Contributor).await?;
        let contributor = clearance::authorize(
            &db,
            Caller::authenticated(OTHER_USER),
            scope.budget_id(),
            Operation::ViewReports,
        )
        .await?;

        let result = assign(&db, &contributor, groceries.id, march(), 100).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        assert_eq!(assigned(&db, &contributor, groceries.id, march()).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_balance_recurrence_goes_negative() -> Result<()> {
        let (db, scope) = setup_with_accounts().await?;
        let groceries = create_test_category(&db, &scope, "Dining").await?;
        let resolver = StoreResolver::new(&db);

        assign(&db, &scope, groceries.id, march(), 1000).await?;
        let mut spend = request("Checking", None, &[("Dining", -1500)]);
        spend.date = "2024-03-20".to_string();
        log_transaction(&db, &resolver, &scope, spend).await?;

        assert_eq!(activity(&db, &scope, groceries.id, march()).await?, -1500);
        assert_eq!(balance(&db, &scope, groceries.id, march()).await?, -500);

        // Next month carries the deficit forward
        let april = march().next()?;
        assign(&db, &scope, groceries.id, april, 800).await?;
        let previous = balance(&db, &scope, groceries.id, march()).await?;
        let current = balance(&db, &scope, groceries.id, april).await?;
        let assigned_april = assigned(&db, &scope, groceries.id, april).await?;
        let activity_april = activity(&db, &scope, groceries.id, april).await?;
        assert_eq!(current, previous + assigned_april + activity_april);
        assert_eq!(current, 300);

        // Earlier months ignore later activity
        let february = march().previous()?;
        assert_eq!(balance(&db, &scope, groceries.id, february).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_capital_scenario_with_transfer() -> Result<()> {
        let (db, scope) = setup_with_accounts().await?;
        let groceries = create_test_category(&db, &scope, "Market").await?;
        let resolver = StoreResolver::new(&db);

        let deposit = log_transaction(
            &db,
            &resolver,
            &scope,
            request("Checking", None, &[("Market", 10_000)]),
        )
        .await?;
        assert_eq!(budget_capital(&db, &scope).await?, 10_000);
        assert_eq!(balance(&db, &scope, groceries.id, march()).await?, 10_000);

        log_transaction(
            &db,
            &resolver,
            &scope,
            request("Checking", None, &[("Market", -5000)]),
        )
        .await?;
        assert_eq!(budget_capital(&db, &scope).await?, 5000);
        assert_eq!(balance(&db, &scope, groceries.id, march()).await?, 5000);

        let checking = deposit.transaction.account_id;
        let checking_before = account_capital(&db, &scope, checking).await?;

        let transfer = log_transaction(
            &db,
            &resolver,
            &scope,
            request("Checking", Some("Savings"), &[(TRANSFER_AMOUNT, -5000)]),
        )
        .await?;
        let savings = transfer.transfer.unwrap().counterpart.account_id;

        assert_eq!(budget_capital(&db, &scope).await?, 5000);
        assert_eq!(account_capital(&db, &scope, checking).await?, checking_before - 5000);
        assert_eq!(account_capital(&db, &scope, savings).await?, 5000);
        Ok(())
    }

    #[tokio::test]
    async fn test_transfers_leave_budget_capital_unchanged() -> Result<()> {
        let (db, scope) = setup_with_accounts().await?;
        let resolver = StoreResolver::new(&db);

        log_transaction(
            &db,
            &resolver,
            &scope,
            request("Checking", None, &[(UNCATEGORIZED, 10_000)]),
        )
        .await?;
        let before = budget_capital(&db, &scope).await?;

        log_transaction(
            &db,
            &resolver,
            &scope,
            request("Checking", Some("Savings"), &[(TRANSFER_AMOUNT, -5000)]),
        )
        .await?;
        assert_eq!(budget_capital(&db, &scope).await?, before);
        assert_eq!(before, 10_000);
        Ok(())
    }

    #[tokio::test]
    async fn test_cleared_capital_is_distinct() -> Result<()> {
        let (db, scope) = setup_with_accounts().await?;
        let resolver = StoreResolver::new(&db);

        let mut cleared = request("Checking", None, &[(UNCATEGORIZED, 10_000)]);
        cleared.cleared = true;
        let record = log_transaction(&db, &resolver, &scope, cleared).await?;
        log_transaction(
            &db,
            &resolver,
            &scope,
            request("Checking", None, &[("Groceries", -2500)]),
        )
        .await?;

        let checking = record.transaction.account_id;
        assert_eq!(account_capital(&db, &scope, checking).await?, 7500);
        assert_eq!(account_cleared_capital(&db, &scope, checking).await?, 10_000);
        Ok(())
    }

    #[tokio::test]
    async fn test_month_report_scenario() -> Result<()> {
        let (db, scope) = setup_with_accounts().await?;
        let groceries = create_test_category(&db, &scope, "Food").await?;
        let savings_goal = create_test_category(&db, &scope, "Holiday").await?;
        let resolver = StoreResolver::new(&db);

        // Prior month: 10000 income, 2000 parked on Food
        let mut income = request("Checking", None, &[(UNCATEGORIZED, 10_000)]);
        income.date = "2024-02-10".to_string();
        log_transaction(&db, &resolver, &scope, income).await?;
        let february = march().previous()?;
        assign(&db, &scope, groceries.id, february, 2000).await?;

        let food_before = balance(&db, &scope, groceries.id, february).await?;
        let holiday_before = balance(&db, &scope, savings_goal.id, february).await?;

        assign(&db, &scope, groceries.id, march(), 4000).await?;
        assign(&db, &scope, savings_goal.id, march(), 5000).await?;
        log_transaction(
            &db,
            &resolver,
            &scope,
            request("Checking", None, &[("Food", -4000)]),
        )
        .await?;

        let report = month_report(&db, &scope, march()).await?;
        let food = report
            .categories
            .iter()
            .find(|row| row.category_id == groceries.id)
            .unwrap();
        let holiday = report
            .categories
            .iter()
            .find(|row| row.category_id == savings_goal.id)
            .unwrap();

        assert_eq!(food.balance, food_before);
        assert_eq!(food.assigned, 4000);
        assert_eq!(food.activity, -4000);
        assert_eq!(holiday.balance, holiday_before + 5000);
        assert_eq!(report.capital, 6000);
        // 6000 capital, 2000 on Food, 5000 on Holiday
        assert_eq!(report.assignable, -1000);
        assert_eq!(
            assignable_money(&db, &scope, march()).await?,
            report.assignable
        );

        // Categories without figures still appear
        let rent = report
            .categories
            .iter()
            .find(|row| row.name == "Rent")
            .unwrap();
        assert_eq!((rent.assigned, rent.activity, rent.balance), (0, 0, 0));
        Ok(())
    }
}
