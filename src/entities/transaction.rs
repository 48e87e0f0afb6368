//! Transaction entity - one dated ledger entry on one account.
//!
//! The money of a transaction lives in its splits; the `transaction_type`
//! records whether that money flows in or out and whether the entry is one leg
//! of a transfer.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Semantic type of a stored transaction.
///
/// There is deliberately no "unset" variant: an untyped transaction cannot be
/// persisted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money into an account from outside the budget
    #[sea_orm(string_value = "DEPOSIT")]
    Deposit,
    /// Money out of an account to outside the budget
    #[sea_orm(string_value = "WITHDRAWAL")]
    Withdrawal,
    /// Receiving leg of a transfer
    #[sea_orm(string_value = "TRANSFER_TO")]
    TransferTo,
    /// Sending leg of a transfer
    #[sea_orm(string_value = "TRANSFER_FROM")]
    TransferFrom,
}

impl TransactionType {
    /// Infers the type from the sign of a nonzero amount.
    #[must_use]
    pub const fn infer(positive: bool, is_transfer: bool) -> Self {
        match (positive, is_transfer) {
            (true, true) => Self::TransferTo,
            (true, false) => Self::Deposit,
            (false, true) => Self::TransferFrom,
            (false, false) => Self::Withdrawal,
        }
    }

    /// The type of an entry carrying the negated amounts.
    #[must_use]
    pub const fn invert(self) -> Self {
        match self {
            Self::Deposit => Self::Withdrawal,
            Self::Withdrawal => Self::Deposit,
            Self::TransferTo => Self::TransferFrom,
            Self::TransferFrom => Self::TransferTo,
        }
    }

    /// True for either leg of a transfer.
    #[must_use]
    pub const fn is_transfer(self) -> bool {
        match self {
            Self::TransferTo | Self::TransferFrom => true,
            Self::Deposit | Self::Withdrawal => false,
        }
    }

    /// True when the split amounts of this type are positive.
    #[must_use]
    pub const fn is_inflow(self) -> bool {
        match self {
            Self::Deposit | Self::TransferTo => true,
            Self::Withdrawal | Self::TransferFrom => false,
        }
    }
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Budget the transaction belongs to
    pub budget_id: i64,
    /// Account the money moves on
    pub account_id: i64,
    /// Optional counterparty
    pub payee_id: Option<i64>,
    /// Inferred semantic type
    pub transaction_type: TransactionType,
    /// Calendar day the transaction is booked on
    pub date: Date,
    /// Whether the transaction has cleared the bank
    pub cleared: bool,
    /// Free-text notes
    pub notes: String,
    /// User who logged the transaction
    pub logger_id: i64,
    /// When the row was written
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one budget
    #[sea_orm(
        belongs_to = "super::budget::Entity",
        from = "Column::BudgetId",
        to = "super::budget::Column::Id",
        on_delete = "Cascade"
    )]
    Budget,
    /// Each transaction moves money on one account
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id",
        on_delete = "Cascade"
    )]
    Account,
    /// A transaction may name a payee
    #[sea_orm(
        belongs_to = "super::payee::Entity",
        from = "Column::PayeeId",
        to = "super::payee::Column::Id"
    )]
    Payee,
    /// One transaction has one or more splits
    #[sea_orm(has_many = "super::transaction_split::Entity")]
    Splits,
}

impl Related<super::budget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budget.def()
    }
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl Related<super::payee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payee.def()
    }
}

impl Related<super::transaction_split::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Splits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_from_sign() {
        assert_eq!(TransactionType::infer(true, false), TransactionType::Deposit);
        assert_eq!(TransactionType::infer(false, false), TransactionType::Withdrawal);
        assert_eq!(TransactionType::infer(true, true), TransactionType::TransferTo);
        assert_eq!(TransactionType::infer(false, true), TransactionType::TransferFrom);
    }

    #[test]
    fn test_invert_is_involution() {
        for ty in [
            TransactionType::Deposit,
            TransactionType::Withdrawal,
            TransactionType::TransferTo,
            TransactionType::TransferFrom,
        ] {
            assert_ne!(ty.invert(), ty);
            assert_eq!(ty.invert().invert(), ty);
            assert_eq!(ty.invert().is_transfer(), ty.is_transfer());
            assert_ne!(ty.invert().is_inflow(), ty.is_inflow());
        }
    }
}
