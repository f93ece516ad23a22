//! Checking off planned meals and purchased groceries.
//!
//! Each toggle reads the current flag and writes its negation only if the
//! flag is still what was read. A concurrent toggle in between surfaces as
//! [`ServiceError::Conflict`] instead of silently undoing the other write.

use sqlx::PgPool;
use uuid::Uuid;

use nutriplan_db::models::{MealPlanItem, ShoppingListItem};
use nutriplan_db::queries::{meal_plan_items, shopping_lists};

use crate::auth::Identity;
use crate::error::{ServiceError, ServiceResult};

pub async fn toggle_meal_item(
    pool: &PgPool,
    identity: Identity,
    item_id: Uuid,
) -> ServiceResult<MealPlanItem> {
    let user_id = identity.require()?;
    let current = meal_plan_items::get_item_for_user(pool, user_id, item_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("meal plan item"))?;

    let updated = meal_plan_items::set_item_completed(
        pool,
        user_id,
        item_id,
        current.is_completed,
        !current.is_completed,
    )
    .await?
    .ok_or_else(|| ServiceError::Conflict("meal plan item was changed concurrently".into()))?;

    tracing::debug!(user_id = %user_id, item_id = %item_id, completed = updated.is_completed, "toggled meal");
    Ok(updated)
}

pub async fn toggle_shopping_item(
    pool: &PgPool,
    identity: Identity,
    item_id: Uuid,
) -> ServiceResult<ShoppingListItem> {
    let user_id = identity.require()?;
    let current = shopping_lists::get_item_for_user(pool, user_id, item_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("shopping list item"))?;

    let updated = shopping_lists::set_item_purchased(
        pool,
        user_id,
        item_id,
        current.is_purchased,
        !current.is_purchased,
    )
    .await?
    .ok_or_else(|| ServiceError::Conflict("shopping list item was changed concurrently".into()))?;

    tracing::debug!(user_id = %user_id, item_id = %item_id, purchased = updated.is_purchased, "toggled shopping item");
    Ok(updated)
}
