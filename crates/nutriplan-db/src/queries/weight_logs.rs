//! Database query functions for the `weight_logs` table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::WeightLog;

/// Record the user's weight for a calendar day. A second entry on the same
/// day replaces the first.
pub async fn upsert_weight_log(
    pool: &PgPool,
    user_id: Uuid,
    weight_kg: f64,
    logged_at: NaiveDate,
    notes: Option<&str>,
) -> Result<WeightLog> {
    let row = sqlx::query_as::<_, WeightLog>(
        "INSERT INTO weight_logs (user_id, weight_kg, logged_at, notes) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (user_id, logged_at) \
         DO UPDATE SET weight_kg = EXCLUDED.weight_kg, notes = EXCLUDED.notes \
         RETURNING *",
    )
    .bind(user_id)
    .bind(weight_kg)
    .bind(logged_at)
    .bind(notes)
    .fetch_one(pool)
    .await
    .context("failed to upsert weight log")?;

    Ok(row)
}

/// List the user's entries on or after `since`, oldest first.
pub async fn list_weight_logs_since(
    pool: &PgPool,
    user_id: Uuid,
    since: NaiveDate,
) -> Result<Vec<WeightLog>> {
    let logs = sqlx::query_as::<_, WeightLog>(
        "SELECT * FROM weight_logs \
         WHERE user_id = $1 AND logged_at >= $2 \
         ORDER BY logged_at ASC",
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(pool)
    .await
    .context("failed to list weight logs")?;

    Ok(logs)
}

/// Delete one of the user's entries. Returns whether a row was removed.
pub async fn delete_weight_log(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM weight_logs WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("failed to delete weight log")?;

    Ok(result.rows_affected() > 0)
}
