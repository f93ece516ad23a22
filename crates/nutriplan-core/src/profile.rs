//! Profile service: creation, edits and target recalculation.

use chrono::NaiveDate;
use sqlx::PgPool;

use nutriplan_db::models::Profile;
use nutriplan_db::queries::profiles::{self, ProfileUpdate};

use crate::auth::Identity;
use crate::error::{ServiceError, ServiceResult};
use crate::nutrition::{self, BmrFormula, BodyStats, NutritionTargets};
use crate::onboarding::{
    HEIGHT_CM, PREP_TIME_MINUTES, SERVINGS, WEEKLY_GOAL_KG, WEIGHT_KG,
};

/// Create the caller's profile if it does not exist yet.
pub async fn create_profile(
    pool: &PgPool,
    identity: Identity,
    email: Option<&str>,
    full_name: Option<&str>,
) -> ServiceResult<Profile> {
    let user_id = identity.require()?;
    Ok(profiles::create_profile(pool, user_id, email, full_name).await?)
}

pub async fn get_profile(pool: &PgPool, identity: Identity) -> ServiceResult<Profile> {
    let user_id = identity.require()?;
    profiles::get_profile(pool, user_id)
        .await?
        .ok_or(ServiceError::ProfileNotFound)
}

fn check<T: PartialOrd + std::fmt::Display>(
    field: &str,
    value: Option<T>,
    range: std::ops::RangeInclusive<T>,
) -> ServiceResult<()> {
    match value {
        Some(v) if !range.contains(&v) => Err(ServiceError::invalid(format!(
            "{field} must be between {} and {}, got {v}",
            range.start(),
            range.end()
        ))),
        _ => Ok(()),
    }
}

/// Check the numeric fields of a partial update.
pub fn validate_update(update: &ProfileUpdate) -> ServiceResult<()> {
    check("height_cm", update.height_cm, HEIGHT_CM)?;
    check("current_weight_kg", update.current_weight_kg, WEIGHT_KG)?;
    check("target_weight_kg", update.target_weight_kg, WEIGHT_KG)?;
    check("weekly_goal_kg", update.weekly_goal_kg, WEEKLY_GOAL_KG)?;
    check(
        "meal_prep_time_minutes",
        update.meal_prep_time_minutes,
        PREP_TIME_MINUTES,
    )?;
    check("servings_per_meal", update.servings_per_meal, SERVINGS)?;
    Ok(())
}

/// Apply user-entered changes. Computed targets are not touched; call
/// [`recalculate_targets`] afterwards if body stats changed.
pub async fn update_profile(
    pool: &PgPool,
    identity: Identity,
    update: &ProfileUpdate,
) -> ServiceResult<Profile> {
    let user_id = identity.require()?;
    validate_update(update)?;
    profiles::update_profile(pool, user_id, update)
        .await?
        .ok_or(ServiceError::ProfileNotFound)
}

/// Recompute the stored targets from the stored body stats.
pub async fn recalculate_targets(
    pool: &PgPool,
    identity: Identity,
    today: NaiveDate,
    unspecified_gender: BmrFormula,
) -> ServiceResult<(Profile, NutritionTargets)> {
    let user_id = identity.require()?;
    let profile = profiles::get_profile(pool, user_id)
        .await?
        .ok_or(ServiceError::ProfileNotFound)?;

    let stats = BodyStats::from_profile(&profile)
        .map_err(|field| ServiceError::invalid(format!("profile is missing {field}")))?;
    let targets = nutrition::compute_targets(&stats, today, unspecified_gender);
    if targets.gender_fallback {
        tracing::info!(
            user_id = %user_id,
            formula = ?targets.formula,
            "no BMR formula for gender; using configured fallback"
        );
    }

    let profile = profiles::set_targets(pool, user_id, &targets.to_update())
        .await?
        .ok_or(ServiceError::ProfileNotFound)?;

    tracing::info!(
        user_id = %user_id,
        calories = targets.daily_calories,
        needs_review = targets.macros.carbs_clamped,
        "recalculated nutrition targets"
    );
    Ok((profile, targets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_update_is_valid() {
        assert!(validate_update(&ProfileUpdate::default()).is_ok());
    }

    #[test]
    fn out_of_range_update_is_rejected() {
        let update = ProfileUpdate {
            servings_per_meal: Some(0),
            ..ProfileUpdate::default()
        };
        let err = validate_update(&update).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid input: servings_per_meal must be between 1 and 12, got 0"
        );

        let update = ProfileUpdate {
            current_weight_kg: Some(600.0),
            ..ProfileUpdate::default()
        };
        assert!(validate_update(&update).is_err());
    }
}
