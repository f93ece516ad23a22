//! Body weight log and progress towards the target weight.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use nutriplan_db::models::WeightLog;
use nutriplan_db::queries::{profiles, weight_logs};

use crate::auth::Identity;
use crate::error::{ServiceError, ServiceResult};
use crate::onboarding::WEIGHT_KG;

pub const DEFAULT_HISTORY_DAYS: u32 = 30;
pub const MAX_HISTORY_DAYS: u32 = 3650;
/// How far back the starting weight is looked up.
pub const PROGRESS_WINDOW_DAYS: u32 = 90;

/// Record the weight for `logged_on`, replacing an earlier entry for the same
/// day, and refresh the profile's cached current weight from the newest log.
///
/// Backfilling an older day therefore leaves the current weight alone.
pub async fn log_weight(
    pool: &PgPool,
    identity: Identity,
    weight_kg: f64,
    logged_on: NaiveDate,
    notes: Option<&str>,
) -> ServiceResult<WeightLog> {
    let user_id = identity.require()?;
    if !WEIGHT_KG.contains(&weight_kg) {
        return Err(ServiceError::invalid(format!(
            "weight must be between {} and {} kg, got {weight_kg}",
            WEIGHT_KG.start(),
            WEIGHT_KG.end()
        )));
    }
    let notes = notes.map(str::trim).filter(|n| !n.is_empty());

    let log = weight_logs::upsert_weight_log(pool, user_id, weight_kg, logged_on, notes).await?;

    sync_profile_weight(pool, user_id).await;
    tracing::debug!(user_id = %user_id, logged_on = %logged_on, "logged weight");
    Ok(log)
}

/// The log is the source of truth; a stale cache is only logged.
async fn sync_profile_weight(pool: &PgPool, user_id: Uuid) {
    if let Err(e) = profiles::sync_current_weight(pool, user_id).await {
        tracing::warn!(
            user_id = %user_id,
            error = %e,
            "failed to sync current weight to profile"
        );
    }
}

fn since(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Entries of the last `days` days (default 30), oldest first.
pub async fn list_weight_logs(
    pool: &PgPool,
    identity: Identity,
    days: Option<u32>,
    today: NaiveDate,
) -> ServiceResult<Vec<WeightLog>> {
    let user_id = identity.require()?;
    let days = days.unwrap_or(DEFAULT_HISTORY_DAYS);
    if !(1..=MAX_HISTORY_DAYS).contains(&days) {
        return Err(ServiceError::invalid(format!(
            "days must be between 1 and {MAX_HISTORY_DAYS}"
        )));
    }
    Ok(weight_logs::list_weight_logs_since(pool, user_id, since(today, days)).await?)
}

pub async fn delete_weight_log(pool: &PgPool, identity: Identity, id: Uuid) -> ServiceResult<()> {
    let user_id = identity.require()?;
    if weight_logs::delete_weight_log(pool, user_id, id).await? {
        sync_profile_weight(pool, user_id).await;
        Ok(())
    } else {
        Err(ServiceError::not_found("weight log"))
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ProgressStats {
    pub current_weight_kg: Option<f64>,
    pub target_weight_kg: Option<f64>,
    /// Earliest logged weight in the progress window, else the current one.
    pub starting_weight_kg: Option<f64>,
    /// Current minus starting; negative means weight was lost.
    pub total_change_kg: Option<f64>,
    /// Share of the distance from start to target covered so far.
    pub progress_to_goal_pct: Option<f64>,
    pub history: Vec<WeightLog>,
}

/// Derive progress figures from the profile weights and the logs in the
/// window, which must be sorted oldest first.
pub fn compute_progress(
    current_weight_kg: Option<f64>,
    target_weight_kg: Option<f64>,
    history: Vec<WeightLog>,
) -> ProgressStats {
    let starting = history.first().map(|l| l.weight_kg).or(current_weight_kg);
    let total_change = match (current_weight_kg, starting) {
        (Some(current), Some(start)) => Some(current - start),
        _ => None,
    };
    let progress = match (starting, current_weight_kg, target_weight_kg) {
        (Some(start), Some(current), Some(target)) if start != target => {
            Some(((start - current) / (start - target)).abs() * 100.0)
        }
        _ => None,
    };

    ProgressStats {
        current_weight_kg,
        target_weight_kg,
        starting_weight_kg: starting,
        total_change_kg: total_change,
        progress_to_goal_pct: progress,
        history,
    }
}

pub async fn progress_stats(
    pool: &PgPool,
    identity: Identity,
    today: NaiveDate,
) -> ServiceResult<ProgressStats> {
    let user_id = identity.require()?;
    let profile = profiles::get_profile(pool, user_id)
        .await?
        .ok_or(ServiceError::ProfileNotFound)?;
    let history =
        weight_logs::list_weight_logs_since(pool, user_id, since(today, PROGRESS_WINDOW_DAYS))
            .await?;

    Ok(compute_progress(
        profile.current_weight_kg,
        profile.target_weight_kg,
        history,
    ))
}
