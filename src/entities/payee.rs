//! Payee entity - a named counterparty. Transactions reference payees by id,
//! so retiring a payee never rewrites history.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payee database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payees")]
pub struct Model {
    /// Unique identifier for the payee
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Budget this payee belongs to
    pub budget_id: i64,
    /// Payee name, unique within the budget
    pub name: String,
    /// Retired payees no longer resolve by name but stay referenced
    pub is_deleted: bool,
}

/// Defines relationships between Payee and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each payee belongs to one budget
    #[sea_orm(
        belongs_to = "super::budget::Entity",
        from = "Column::BudgetId",
        to = "super::budget::Column::Id",
        on_delete = "Cascade"
    )]
    Budget,
}

impl Related<super::budget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budget.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
