//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod account;
pub mod budget;
pub mod budget_member;
pub mod category;
pub mod category_group;
pub mod monthly_assignment;
pub mod payee;
pub mod transaction;
pub mod transaction_split;
pub mod transfer;

// Re-export specific types to avoid conflicts
pub use account::{Column as AccountColumn, Entity as Account, Model as AccountModel};
pub use budget::{Column as BudgetColumn, Entity as Budget, Model as BudgetModel};
pub use budget_member::{
    Column as BudgetMemberColumn, Entity as BudgetMember, Model as BudgetMemberModel,
};
pub use category::{Column as CategoryColumn, Entity as Category, Model as CategoryModel};
pub use category_group::{
    Column as CategoryGroupColumn, Entity as CategoryGroup, Model as CategoryGroupModel,
};
pub use monthly_assignment::{
    Column as MonthlyAssignmentColumn, Entity as MonthlyAssignment,
    Model as MonthlyAssignmentModel,
};
pub use payee::{Column as PayeeColumn, Entity as Payee, Model as PayeeModel};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
    TransactionType,
};
pub use transaction_split::{
    Column as TransactionSplitColumn, Entity as TransactionSplit, Model as TransactionSplitModel,
};
pub use transfer::{Column as TransferColumn, Entity as Transfer, Model as TransferModel};
