//! Core business logic, independent of any transport.
//!
//! Every budget-scoped operation takes the [`clearance::BudgetScope`] issued by
//! [`clearance::authorize`] as an explicit argument.

pub mod account;
pub mod accounting;
pub mod budget;
pub mod category;
pub mod clearance;
pub mod ledger;
pub mod month;
pub mod payee;
pub mod resolver;
pub mod role;
pub mod transaction;
pub mod validator;
