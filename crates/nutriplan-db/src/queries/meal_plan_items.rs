//! Database query functions for the `meal_plan_items` table.
//!
//! Items carry no owner column; ownership is checked through the parent
//! meal plan.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{MealPlanItem, MealType};

/// A scheduled meal within a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMealPlanItem {
    pub meal_plan_id: Uuid,
    pub recipe_id: Option<Uuid>,
    pub plan_date: NaiveDate,
    pub meal_type: MealType,
    /// Position of the meal within its day, as the generator ordered it.
    pub meal_order: i32,
    pub servings: i32,
    pub recipe_name: Option<String>,
    pub calories: Option<i32>,
}

/// Insert a plan item.
pub async fn insert_meal_plan_item(pool: &PgPool, item: &NewMealPlanItem) -> Result<MealPlanItem> {
    let row = sqlx::query_as::<_, MealPlanItem>(
        "INSERT INTO meal_plan_items \
            (meal_plan_id, recipe_id, plan_date, meal_type, meal_order, servings, \
             recipe_name, calories) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING *",
    )
    .bind(item.meal_plan_id)
    .bind(item.recipe_id)
    .bind(item.plan_date)
    .bind(item.meal_type)
    .bind(item.meal_order)
    .bind(item.servings)
    .bind(item.recipe_name.as_deref())
    .bind(item.calories)
    .fetch_one(pool)
    .await
    .context("failed to insert meal plan item")?;

    Ok(row)
}

/// List every item of a plan in calendar order.
pub async fn list_items_for_plan(pool: &PgPool, meal_plan_id: Uuid) -> Result<Vec<MealPlanItem>> {
    let items = sqlx::query_as::<_, MealPlanItem>(
        "SELECT * FROM meal_plan_items \
         WHERE meal_plan_id = $1 \
         ORDER BY plan_date, meal_order, created_at",
    )
    .bind(meal_plan_id)
    .fetch_all(pool)
    .await
    .context("failed to list meal plan items")?;

    Ok(items)
}

/// List the items of a plan scheduled on one date.
pub async fn list_items_for_date(
    pool: &PgPool,
    meal_plan_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<MealPlanItem>> {
    let items = sqlx::query_as::<_, MealPlanItem>(
        "SELECT * FROM meal_plan_items \
         WHERE meal_plan_id = $1 AND plan_date = $2 \
         ORDER BY meal_order, created_at",
    )
    .bind(meal_plan_id)
    .bind(date)
    .fetch_all(pool)
    .await
    .context("failed to list meal plan items for date")?;

    Ok(items)
}

/// Fetch an item if it belongs to one of the user's plans.
pub async fn get_item_for_user(
    pool: &PgPool,
    user_id: Uuid,
    item_id: Uuid,
) -> Result<Option<MealPlanItem>> {
    let item = sqlx::query_as::<_, MealPlanItem>(
        "SELECT i.* FROM meal_plan_items i \
         JOIN meal_plans p ON p.id = i.meal_plan_id \
         WHERE i.id = $1 AND p.user_id = $2",
    )
    .bind(item_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch meal plan item")?;

    Ok(item)
}

/// Set the completion flag, but only if it still holds `expected`.
///
/// `completed_at` is set to now when completing and cleared otherwise.
/// Returns `None` when the item is missing, not owned by the user, or was
/// changed concurrently.
pub async fn set_item_completed(
    pool: &PgPool,
    user_id: Uuid,
    item_id: Uuid,
    expected: bool,
    completed: bool,
) -> Result<Option<MealPlanItem>> {
    let item = sqlx::query_as::<_, MealPlanItem>(
        "UPDATE meal_plan_items i \
         SET is_completed = $4, \
             completed_at = CASE WHEN $4 THEN now() ELSE NULL END \
         FROM meal_plans p \
         WHERE i.id = $2 AND i.meal_plan_id = p.id AND p.user_id = $1 \
           AND i.is_completed = $3 \
         RETURNING i.*",
    )
    .bind(user_id)
    .bind(item_id)
    .bind(expected)
    .bind(completed)
    .fetch_optional(pool)
    .await
    .context("failed to update meal plan item")?;

    Ok(item)
}
