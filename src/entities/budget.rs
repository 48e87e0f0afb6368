//! Budget entity - the top-level container for accounts, categories, payees and transactions.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Budget database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    /// Unique identifier for the budget
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name of the budget
    pub name: String,
    /// When the budget was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Budget and its scoped resources
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One budget has many memberships
    #[sea_orm(has_many = "super::budget_member::Entity")]
    Members,
    /// One budget has many accounts
    #[sea_orm(has_many = "super::account::Entity")]
    Accounts,
    /// One budget has many categories
    #[sea_orm(has_many = "super::category::Entity")]
    Categories,
    /// One budget has many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::budget_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Categories.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
