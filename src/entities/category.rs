//! Category entity - an envelope that money is assigned into each month and spent from.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Category database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    /// Unique identifier for the category
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Budget this category belongs to
    pub budget_id: i64,
    /// Optional group the category is filed under
    pub group_id: Option<i64>,
    /// Category name, unique within the budget
    pub name: String,
}

/// Defines relationships between Category and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each category belongs to one budget
    #[sea_orm(
        belongs_to = "super::budget::Entity",
        from = "Column::BudgetId",
        to = "super::budget::Column::Id",
        on_delete = "Cascade"
    )]
    Budget,
    /// A category may be filed under one group
    #[sea_orm(
        belongs_to = "super::category_group::Entity",
        from = "Column::GroupId",
        to = "super::category_group::Column::Id",
        on_delete = "SetNull"
    )]
    Group,
    /// One category has many monthly assignments
    #[sea_orm(has_many = "super::monthly_assignment::Entity")]
    Assignments,
}

impl Related<super::budget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budget.def()
    }
}

impl Related<super::category_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl Related<super::monthly_assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
