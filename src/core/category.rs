//! Category and category group business logic.
//!
//! Categories are the envelopes money is assigned to. Groups only organize
//! them; deleting a group leaves its categories in place, ungrouped.

use crate::{
    core::clearance::{BudgetScope, Operation},
    entities::{
        Category, CategoryGroup, MonthlyAssignment, TransactionSplit, category, category_group,
        monthly_assignment, transaction_split,
    },
    errors::{Error, ResourceKind, Result},
};
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

fn trimmed<'a>(name: &'a str, what: &str) -> Result<&'a str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation(format!("{what} name cannot be empty")));
    }
    Ok(name)
}

/// Loads a category by id and checks it belongs to the scope's budget.
pub(crate) async fn find_scoped<C>(
    db: &C,
    scope: &BudgetScope,
    category_id: i64,
) -> Result<category::Model>
where
    C: ConnectionTrait,
{
    let model = Category::find_by_id(category_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(ResourceKind::Category, category_id))?;
    if model.budget_id != scope.budget_id() {
        return Err(Error::forbidden("category belongs to another budget"));
    }
    Ok(model)
}

async fn find_scoped_group<C>(
    db: &C,
    scope: &BudgetScope,
    group_id: i64,
) -> Result<category_group::Model>
where
    C: ConnectionTrait,
{
    let model = CategoryGroup::find_by_id(group_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(ResourceKind::Group, group_id))?;
    if model.budget_id != scope.budget_id() {
        return Err(Error::forbidden("group belongs to another budget"));
    }
    Ok(model)
}

fn group_taken(name: &str) -> String {
    format!("group '{name}' already exists")
}

fn category_taken(name: &str) -> String {
    format!("category '{name}' already exists")
}

/// Creates a category group.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn create_group(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    name: &str,
) -> Result<category_group::Model> {
    scope.require(Operation::ManageCategories)?;
    let name = trimmed(name, "group")?;

    let created = category_group::ActiveModel {
        budget_id: Set(scope.budget_id()),
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| Error::duplicate(err, group_taken(name)))?;

    info!(group_id = created.id, name = %created.name, "Created group");
    Ok(created)
}

/// Lists the budget's groups by name.
pub async fn list_groups(
    db: &DatabaseConnection,
    scope: &BudgetScope,
) -> Result<Vec<category_group::Model>> {
    scope.require(Operation::ViewBudget)?;
    CategoryGroup::find()
        .filter(category_group::Column::BudgetId.eq(scope.budget_id()))
        .order_by_asc(category_group::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Renames a group.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn rename_group(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    group_id: i64,
    name: &str,
) -> Result<category_group::Model> {
    scope.require(Operation::ManageCategories)?;
    let existing = find_scoped_group(db, scope, group_id).await?;
    let name = trimmed(name, "group")?;
    if existing.name == name {
        return Ok(existing);
    }

    let mut active: category_group::ActiveModel = existing.into();
    active.name = Set(name.to_string());
    let updated = active
        .update(db)
        .await
        .map_err(|err| Error::duplicate(err, group_taken(name)))?;

    info!(group_id, name = %updated.name, "Renamed group");
    Ok(updated)
}

/// Deletes a group; its categories become ungrouped.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn delete_group(db: &DatabaseConnection, scope: &BudgetScope, group_id: i64) -> Result<()> {
    scope.require(Operation::ManageCategories)?;

    let txn = db.begin().await?;
    find_scoped_group(&txn, scope, group_id).await?;
    Category::update_many()
        .col_expr(category::Column::GroupId, Expr::value(Option::<i64>::None))
        .filter(category::Column::GroupId.eq(group_id))
        .exec(&txn)
        .await?;
    CategoryGroup::delete_by_id(group_id).exec(&txn).await?;
    txn.commit().await?;

    info!(group_id, "Deleted group");
    Ok(())
}

/// Creates a category, optionally inside a group of the same budget.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn create_category(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    name: &str,
    group_id: Option<i64>,
) -> Result<category::Model> {
    scope.require(Operation::ManageCategories)?;
    let name = trimmed(name, "category")?;
    if let Some(group_id) = group_id {
        find_scoped_group(db, scope, group_id).await?;
    }

    let created = category::ActiveModel {
        budget_id: Set(scope.budget_id()),
        group_id: Set(group_id),
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| Error::duplicate(err, category_taken(name)))?;

    info!(category_id = created.id, name = %created.name, "Created category");
    Ok(created)
}

/// Retrieves one category.
pub async fn get_category(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    category_id: i64,
) -> Result<category::Model> {
    scope.require(Operation::ViewBudget)?;
    find_scoped(db, scope, category_id).await
}

/// Lists the budget's categories by name, optionally only one group's.
pub async fn list_categories(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    group_id: Option<i64>,
) -> Result<Vec<category::Model>> {
    scope.require(Operation::ViewBudget)?;

    let mut query = Category::find().filter(category::Column::BudgetId.eq(scope.budget_id()));
    if let Some(group_id) = group_id {
        query = query.filter(category::Column::GroupId.eq(group_id));
    }
    query
        .order_by_asc(category::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Renames a category.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn rename_category(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    category_id: i64,
    name: &str,
) -> Result<category::Model> {
    scope.require(Operation::ManageCategories)?;
    let existing = find_scoped(db, scope, category_id).await?;
    let name = trimmed(name, "category")?;
    if existing.name == name {
        return Ok(existing);
    }

    let mut active: category::ActiveModel = existing.into();
    active.name = Set(name.to_string());
    let updated = active
        .update(db)
        .await
        .map_err(|err| Error::duplicate(err, category_taken(name)))?;

    info!(category_id, name = %updated.name, "Renamed category");
    Ok(updated)
}

/// Moves a category into a group, or out of any group with `None`.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn move_category(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    category_id: i64,
    group_id: Option<i64>,
) -> Result<category::Model> {
    scope.require(Operation::ManageCategories)?;
    let existing = find_scoped(db, scope, category_id).await?;
    if let Some(group_id) = group_id {
        find_scoped_group(db, scope, group_id).await?;
    }

    let mut active: category::ActiveModel = existing.into();
    active.group_id = Set(group_id);
    let updated = active.update(db).await?;

    info!(category_id, ?group_id, "Moved category");
    Ok(updated)
}

/// Deletes a category that no split references, along with its assignments.
#[instrument(skip(db), fields(budget_id = scope.budget_id()))]
pub async fn delete_category(
    db: &DatabaseConnection,
    scope: &BudgetScope,
    category_id: i64,
) -> Result<()> {
    scope.require(Operation::ManageCategories)?;

    let txn = db.begin().await?;
    let existing = find_scoped(&txn, scope, category_id).await?;
    let referenced = TransactionSplit::find()
        .filter(transaction_split::Column::CategoryId.eq(category_id))
        .count(&txn)
        .await?;
    if referenced > 0 {
        return Err(Error::conflict(format!(
            "category '{}' is used by {referenced} transaction split(s)",
            existing.name
        )));
    }

    MonthlyAssignment::delete_many()
        .filter(monthly_assignment::Column::CategoryId.eq(category_id))
        .exec(&txn)
        .await?;
    Category::delete_by_id(category_id).exec(&txn).await?;
    txn.commit().await?;

    info!(category_id, "Deleted category");
    Ok(())
}
