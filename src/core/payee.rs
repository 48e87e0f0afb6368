//! Payee business logic.
//!
//! Retired payees stay attached to past transactions but no longer resolve by
//! name.

use crate::{
    core::clearance::{BudgetScope, Operation},
    entities::{Payee, payee},
    errors::{Error, ResourceKind, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{info, instrument};

/// Creates a payee.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn create_payee(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    name: &str,
) -> Result<payee::Model> {
    scope.require(Operation::ManagePayees)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("payee name cannot be empty"));
    }

    // Retired payees keep their names
    let created = payee::ActiveModel {
        budget_id: Set(scope.budget_id()),
        name: Set(name.to_string()),
        is_deleted: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| Error::duplicate(err, format!("payee '{name}' already exists")))?;

    info!(payee_id = created.id, name = %created.name, "Created payee");
    Ok(created)
}

/// Lists the budget's active payees by name.
pub async fn list_payees(db: &DatabaseConnection, scope: &BudgetScope) -> Result<Vec<payee::Model>> {
    scope.require(Operation::ViewBudget)?;
    Payee::find()
        .filter(payee::Column::BudgetId.eq(scope.budget_id()))
        .filter(payee::Column::IsDeleted.eq(false))
        .order_by_asc(payee::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retires a payee.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn retire_payee(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    payee_id: i64,
) -> Result<payee::Model> {
    scope.require(Operation::ManagePayees)?;

    let existing = Payee::find_by_id(payee_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(ResourceKind::Payee, payee_id))?;
    if existing.budget_id != scope.budget_id() {
        return Err(Error::forbidden("payee belongs to another budget"));
    }
    if existing.is_deleted {
        return Err(Error::conflict(format!(
            "payee '{}' is already retired",
            existing.name
        )));
    }

    let mut active: payee::ActiveModel = existing.into();
    active.is_deleted = Set(true);
    let updated = active.update(db).await?;

    info!(payee_id, "Retired payee");
    Ok(updated)
}
