//! Database configuration module for the ledger store.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs, including composite keys and foreign keys.

use crate::entities::{
    Account, Budget, BudgetMember, Category, CategoryGroup, MonthlyAssignment, Payee, Transaction,
    TransactionSplit, Transfer, account, category, category_group, payee,
};
use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema, sea_query::Index,
};
use tracing::{debug, info, instrument};

/// Default `SQLite` location used when neither `DATABASE_URL` nor config.toml names one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://envelope_ledger.sqlite?mode=rwc";

/// Establishes a connection to the database at `database_url`.
#[instrument]
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to ledger store");
    Database::connect(database_url).await.map_err(Into::into)
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Makes `(budget_id, name)` unique on `entity`.
async fn create_name_index<C, E>(
    db: &C,
    index_name: &str,
    entity: E,
    budget_id: E::Column,
    name: E::Column,
) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let statement = Index::create()
        .name(index_name)
        .table(entity)
        .col(budget_id)
        .col(name)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates every ledger table and name index that does not exist yet.
///
/// Tables are created parents-first so foreign keys always point at an
/// existing table. Account, group, category and payee names are unique per
/// budget at the store level, so two racing creates cannot both succeed.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, Budget).await?;
    create_table(db, &schema, BudgetMember).await?;
    create_table(db, &schema, Account).await?;
    create_table(db, &schema, CategoryGroup).await?;
    create_table(db, &schema, Category).await?;
    create_table(db, &schema, Payee).await?;
    create_table(db, &schema, Transaction).await?;
    create_table(db, &schema, TransactionSplit).await?;
    create_table(db, &schema, Transfer).await?;
    create_table(db, &schema, MonthlyAssignment).await?;

    create_name_index(
        db,
        "idx_account_budget_name",
        Account,
        account::Column::BudgetId,
        account::Column::Name,
    )
    .await?;
    create_name_index(
        db,
        "idx_category_group_budget_name",
        CategoryGroup,
        category_group::Column::BudgetId,
        category_group::Column::Name,
    )
    .await?;
    create_name_index(
        db,
        "idx_category_budget_name",
        Category,
        category::Column::BudgetId,
        category::Column::Name,
    )
    .await?;
    create_name_index(
        db,
        "idx_payee_budget_name",
        Payee,
        payee::Column::BudgetId,
        payee::Column::Name,
    )
    .await?;

    info!("Ledger tables ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::{
        AccountModel, BudgetMemberModel, BudgetModel, MonthlyAssignmentModel,
        TransactionModel, TransactionSplitModel, TransferModel,
    };
    use sea_orm::{QuerySelect, Set, SqlErr, prelude::*};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<BudgetModel> = Budget::find().limit(1).all(&db).await?;
        let _: Vec<BudgetMemberModel> = BudgetMember::find().limit(1).all(&db).await?;
        let _: Vec<AccountModel> = Account::find().limit(1).all(&db).await?;
        let _: Vec<TransactionModel> = Transaction::find().limit(1).all(&db).await?;
        let _: Vec<TransactionSplitModel> = TransactionSplit::find().limit(1).all(&db).await?;
        let _: Vec<TransferModel> = Transfer::find().limit(1).all(&db).await?;
        let _: Vec<MonthlyAssignmentModel> = MonthlyAssignment::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_names_are_unique_per_budget() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        for name in ["Household", "Holiday"] {
            crate::entities::budget::ActiveModel {
                name: Set(name.to_string()),
                created_at: Set(chrono::Utc::now()),
                ..Default::default()
            }
            .insert(&db)
            .await?;
        }
        let account = |budget_id: i64| account::ActiveModel {
            budget_id: Set(budget_id),
            name: Set("Checking".to_string()),
            is_deleted: Set(false),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        };

        account(1).insert(&db).await?;
        account(2).insert(&db).await?;
        let duplicate = account(1).insert(&db).await.unwrap_err();
        assert!(matches!(
            duplicate.sql_err(),
            Some(SqlErr::UniqueConstraintViolation(_))
        ));
        Ok(())
    }
}
