//! Transaction split entity - one category line of a transaction.
//!
//! Amounts are signed integer cents and never zero.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction split database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_splits")]
pub struct Model {
    /// Unique identifier for the split
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning transaction
    pub transaction_id: i64,
    /// Category charged, `None` for uncategorized and transfer amounts
    pub category_id: Option<i64>,
    /// Signed amount in cents
    pub amount: i64,
}

/// Defines relationships between `TransactionSplit` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each split belongs to one transaction
    #[sea_orm(
        belongs_to = "super::transaction::Entity",
        from = "Column::TransactionId",
        to = "super::transaction::Column::Id",
        on_delete = "Cascade"
    )]
    Transaction,
    /// A split may charge a category
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
