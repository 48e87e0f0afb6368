//! Monthly assignment entity - money assigned to a category for one month.
//!
//! Keyed by `(category_id, month)` so repeated assignments accumulate into a
//! single row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Monthly assignment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monthly_assignments")]
pub struct Model {
    /// Category the money is assigned to
    #[sea_orm(primary_key, auto_increment = false)]
    pub category_id: i64,
    /// First day of the assigned month
    #[sea_orm(primary_key, auto_increment = false)]
    pub month: Date,
    /// Accumulated assigned cents
    pub amount: i64,
}

/// Defines relationships between `MonthlyAssignment` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each assignment belongs to one category
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "Cascade"
    )]
    Category,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
