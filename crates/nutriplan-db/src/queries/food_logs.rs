//! Database query functions for the `food_logs` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::{FoodLog, MealType, Mood};

/// A food entry to record. `logged_at` defaults to now.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFoodLog {
    pub user_id: Uuid,
    pub logged_at: Option<DateTime<Utc>>,
    pub meal_type: MealType,
    pub recipe_id: Option<Uuid>,
    pub food_name: String,
    pub description: Option<String>,
    pub servings: f64,
    pub calories: Option<i32>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub photo_url: Option<String>,
    pub photo_analysis: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub mood: Option<Mood>,
}

/// Summed intake over a time window.
#[derive(Debug, Clone, Copy, PartialEq, FromRow)]
pub struct IntakeTotals {
    pub calories: i64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub meal_count: i64,
}

/// Insert a food log entry.
pub async fn insert_food_log(pool: &PgPool, log: &NewFoodLog) -> Result<FoodLog> {
    let row = sqlx::query_as::<_, FoodLog>(
        "INSERT INTO food_logs \
            (user_id, logged_at, meal_type, recipe_id, food_name, description, servings, \
             calories, protein_g, carbs_g, fat_g, photo_url, photo_analysis, notes, mood) \
         VALUES ($1, COALESCE($2, now()), $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, \
                 $14, $15) \
         RETURNING *",
    )
    .bind(log.user_id)
    .bind(log.logged_at)
    .bind(log.meal_type)
    .bind(log.recipe_id)
    .bind(&log.food_name)
    .bind(log.description.as_deref())
    .bind(log.servings)
    .bind(log.calories)
    .bind(log.protein_g)
    .bind(log.carbs_g)
    .bind(log.fat_g)
    .bind(log.photo_url.as_deref())
    .bind(log.photo_analysis.as_ref())
    .bind(log.notes.as_deref())
    .bind(log.mood)
    .fetch_one(pool)
    .await
    .context("failed to insert food log")?;

    Ok(row)
}

/// List the user's entries, newest first, optionally restricted to
/// `[from, to)`.
pub async fn list_food_logs(
    pool: &PgPool,
    user_id: Uuid,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    limit: i64,
) -> Result<Vec<FoodLog>> {
    let (from, to) = window.unzip();
    let logs = sqlx::query_as::<_, FoodLog>(
        "SELECT * FROM food_logs \
         WHERE user_id = $1 \
           AND ($2::timestamptz IS NULL OR logged_at >= $2) \
           AND ($3::timestamptz IS NULL OR logged_at < $3) \
         ORDER BY logged_at DESC \
         LIMIT $4",
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to list food logs")?;

    Ok(logs)
}

/// Delete one of the user's entries. Returns whether a row was removed.
pub async fn delete_food_log(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM food_logs WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("failed to delete food log")?;

    Ok(result.rows_affected() > 0)
}

/// Sum calories and macros of the user's entries in `[from, to)`.
pub async fn intake_totals(
    pool: &PgPool,
    user_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<IntakeTotals> {
    let totals = sqlx::query_as::<_, IntakeTotals>(
        "SELECT \
            COALESCE(SUM(calories), 0)::BIGINT AS calories, \
            COALESCE(SUM(protein_g), 0)::DOUBLE PRECISION AS protein_g, \
            COALESCE(SUM(carbs_g), 0)::DOUBLE PRECISION AS carbs_g, \
            COALESCE(SUM(fat_g), 0)::DOUBLE PRECISION AS fat_g, \
            COUNT(*) AS meal_count \
         FROM food_logs \
         WHERE user_id = $1 AND logged_at >= $2 AND logged_at < $3",
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await
    .context("failed to sum food logs")?;

    Ok(totals)
}
