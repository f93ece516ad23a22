//! Database query functions for the `meal_plans` table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::MealPlan;

/// Fields for a freshly generated plan. New plans are always inserted active.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMealPlan {
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i32,
    pub avg_daily_calories: Option<i32>,
    pub avg_daily_protein_g: Option<i32>,
    pub avg_daily_carbs_g: Option<i32>,
    pub avg_daily_fat_g: Option<i32>,
    pub estimated_total_cost: Option<f64>,
    pub generation_prompt: Option<serde_json::Value>,
}

/// Insert a new active meal plan.
pub async fn insert_meal_plan(
    executor: impl PgExecutor<'_>,
    plan: &NewMealPlan,
) -> Result<MealPlan> {
    let row = sqlx::query_as::<_, MealPlan>(
        "INSERT INTO meal_plans \
            (user_id, name, description, start_date, end_date, total_days, \
             avg_daily_calories, avg_daily_protein_g, avg_daily_carbs_g, avg_daily_fat_g, \
             estimated_total_cost, is_active, generation_prompt) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, TRUE, $12) \
         RETURNING *",
    )
    .bind(plan.user_id)
    .bind(&plan.name)
    .bind(plan.description.as_deref())
    .bind(plan.start_date)
    .bind(plan.end_date)
    .bind(plan.total_days)
    .bind(plan.avg_daily_calories)
    .bind(plan.avg_daily_protein_g)
    .bind(plan.avg_daily_carbs_g)
    .bind(plan.avg_daily_fat_g)
    .bind(plan.estimated_total_cost)
    .bind(plan.generation_prompt.as_ref())
    .fetch_one(executor)
    .await
    .context("failed to insert meal plan")?;

    Ok(row)
}

/// Take the transaction-scoped advisory lock on `user_id`'s plans.
///
/// Held until the surrounding transaction ends, so concurrent activations
/// for one user run one after another even across processes.
pub async fn lock_user_plans(executor: impl PgExecutor<'_>, user_id: Uuid) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text))")
        .bind(user_id)
        .execute(executor)
        .await
        .context("failed to lock user's meal plans")?;

    Ok(())
}

/// Mark every plan of `user_id` except `keep` as inactive. Returns the number
/// of plans that were switched off.
pub async fn deactivate_other_plans(
    executor: impl PgExecutor<'_>,
    user_id: Uuid,
    keep: Uuid,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE meal_plans SET is_active = FALSE, updated_at = now() \
         WHERE user_id = $1 AND id <> $2 AND is_active",
    )
    .bind(user_id)
    .bind(keep)
    .execute(executor)
    .await
    .context("failed to deactivate previous meal plans")?;

    Ok(result.rows_affected())
}

/// List a user's plans, newest first.
pub async fn list_meal_plans(pool: &PgPool, user_id: Uuid) -> Result<Vec<MealPlan>> {
    let plans = sqlx::query_as::<_, MealPlan>(
        "SELECT * FROM meal_plans WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to list meal plans")?;

    Ok(plans)
}

/// Fetch one of the user's plans by ID.
pub async fn get_meal_plan(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<Option<MealPlan>> {
    let plan = sqlx::query_as::<_, MealPlan>(
        "SELECT * FROM meal_plans WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch meal plan")?;

    Ok(plan)
}

/// Fetch the user's active plan. If a failed deactivation left more than one
/// active, the newest wins.
pub async fn get_active_meal_plan(pool: &PgPool, user_id: Uuid) -> Result<Option<MealPlan>> {
    let plan = sqlx::query_as::<_, MealPlan>(
        "SELECT * FROM meal_plans \
         WHERE user_id = $1 AND is_active \
         ORDER BY created_at DESC \
         LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch active meal plan")?;

    Ok(plan)
}

/// Count the user's active plans.
pub async fn count_active_plans(pool: &PgPool, user_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM meal_plans WHERE user_id = $1 AND is_active",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .context("failed to count active meal plans")?;

    Ok(count)
}
