//! Budget membership entity - grants one user one role within one budget.
//!
//! The composite primary key `(budget_id, user_id)` guarantees a user holds at
//! most one role per budget.

use crate::core::role::Role;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Budget membership database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budget_members")]
pub struct Model {
    /// Budget the membership belongs to
    #[sea_orm(primary_key, auto_increment = false)]
    pub budget_id: i64,
    /// Authenticated user identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    /// Privilege tier within the budget
    pub role: Role,
    /// When the membership was granted
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `BudgetMember` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each membership belongs to one budget
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
