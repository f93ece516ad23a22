//! Database query functions for the `onboarding_drafts` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::OnboardingDraftRow;

/// Fetch the in-progress onboarding draft for a user, if any.
pub async fn get_draft(pool: &PgPool, user_id: Uuid) -> Result<Option<OnboardingDraftRow>> {
    let row = sqlx::query_as::<_, OnboardingDraftRow>(
        "SELECT * FROM onboarding_drafts WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch onboarding draft")?;

    Ok(row)
}

/// Insert or replace the draft for a user.
pub async fn upsert_draft(
    pool: &PgPool,
    user_id: Uuid,
    data: &serde_json::Value,
) -> Result<OnboardingDraftRow> {
    let row = sqlx::query_as::<_, OnboardingDraftRow>(
        "INSERT INTO onboarding_drafts (user_id, data) \
         VALUES ($1, $2) \
         ON CONFLICT (user_id) DO UPDATE SET data = EXCLUDED.data, updated_at = now() \
         RETURNING *",
    )
    .bind(user_id)
    .bind(data)
    .fetch_one(pool)
    .await
    .context("failed to save onboarding draft")?;

    Ok(row)
}

/// Remove the draft once it has been committed. Returns whether a row existed.
pub async fn delete_draft(pool: &PgPool, user_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM onboarding_drafts WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .context("failed to delete onboarding draft")?;

    Ok(result.rows_affected() > 0)
}
