//! Transfer entity - links the two legs of a transfer.
//!
//! `from_transaction_id` always names the `TRANSFER_FROM` leg and
//! `to_transaction_id` the `TRANSFER_TO` leg.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transfer link database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transfers")]
pub struct Model {
    /// Unique identifier for the link
    #[sea_orm(primary_key)]
    pub id: i64,
    /// The sending leg
    #[sea_orm(unique)]
    pub from_transaction_id: i64,
    /// The receiving leg
    #[sea_orm(unique)]
    pub to_transaction_id: i64,
}

impl Model {
    /// Returns the leg opposite to `transaction_id`.
    #[must_use]
    pub const fn counterpart_of(&self, transaction_id: i64) -> i64 {
        if self.from_transaction_id == transaction_id {
            self.to_transaction_id
        } else {
            self.from_transaction_id
        }
    }
}

/// Defines relationships between Transfer and the two legs
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The sending leg
    #[sea_orm(
        belongs_to = "super::transaction::Entity",
        from = "Column::FromTransactionId",
        to = "super::transaction::Column::Id",
        on_delete = "Cascade"
    )]
    FromTransaction,
    /// The receiving leg
    #[sea_orm(
        belongs_to = "super::transaction::Entity",
        from = "Column::ToTransactionId",
        to = "super::transaction::Column::Id",
        on_delete = "Cascade"
    )]
    ToTransaction,
}

impl ActiveModelBehavior for ActiveModel {}
