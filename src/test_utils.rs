//! Shared test utilities for the ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test budgets, accounts and categories with sensible defaults.

use crate::{
    core::{
        account, budget,
        category,
        clearance::{BudgetScope, Caller},
        validator::TransactionRequest,
    },
    entities,
    errors::{Error, ResourceKind, Result},
};
use chrono::NaiveDate;
use sea_orm::{DatabaseConnection, prelude::*};

/// User that owns the budget built by [`setup_with_budget`].
pub const OWNER_USER: i64 = 1;

/// A second user with no membership until a test grants one.
pub const OTHER_USER: i64 = 2;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a budget owned by `user_id` and returns the owner's scope.
pub async fn create_test_budget(
    db: &DatabaseConnection,
    user_id: i64,
    name: &str,
) -> Result<BudgetScope> {
    let (_, scope) = budget::create_budget(db, Caller::authenticated(user_id), name).await?;
    Ok(scope)
}

/// Fresh database plus one budget owned by [`OWNER_USER`].
pub async fn setup_with_budget() -> Result<(DatabaseConnection, BudgetScope)> {
    let db = setup_test_db().await?;
    let scope = create_test_budget(&db, OWNER_USER, "Household").await?;
    Ok((db, scope))
}

/// Like [`setup_with_budget`], with accounts `Checking` and `Savings` and
/// categories `Groceries` and `Rent`.
pub async fn setup_with_accounts() -> Result<(DatabaseConnection, BudgetScope)> {
    let (db, scope) = setup_with_budget().await?;
    create_test_account(&db, &scope, "Checking").await?;
    create_test_account(&db, &scope, "Savings").await?;
    create_test_category(&db, &scope, "Groceries").await?;
    create_test_category(&db, &scope, "Rent").await?;
    Ok((db, scope))
}

/// Creates an account in the scoped budget.
pub async fn create_test_account(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    name: &str,
) -> Result<entities::account::Model> {
    account::create_account(db, scope, name).await
}

/// Creates an ungrouped category in the scoped budget.
pub async fn create_test_category(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    name: &str,
) -> Result<entities::category::Model> {
    category::create_category(db, scope, name, None).await
}

/// Looks a category up by name in the scoped budget.
pub async fn find_test_category(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    name: &str,
) -> Result<entities::category::Model> {
    entities::Category::find()
        .filter(entities::category::Column::BudgetId.eq(scope.budget_id()))
        .filter(entities::category::Column::Name.eq(name))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(ResourceKind::Category, name))
}

/// A calendar date; panics on an invalid one.
#[allow(clippy::expect_used)]
#[must_use]
pub fn test_date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

/// A request dated 2024-03-15 with the given amounts.
///
/// `transfer_account` makes it a transfer request.
#[must_use]
pub fn request(
    account: &str,
    transfer_account: Option<&str>,
    amounts: &[(&str, i64)],
) -> TransactionRequest {
    TransactionRequest {
        account: account.to_string(),
        transfer_account: transfer_account.map(str::to_string),
        date: "2024-03-15".to_string(),
        amounts: amounts
            .iter()
            .map(|(name, amount)| ((*name).to_string(), *amount))
            .collect(),
        ..Default::default()
    }
}
