//! Database query functions for the `profiles` table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    ActivityLevel, BudgetLevel, CookingSkill, DietType, Gender, PrimaryGoal, Profile,
};

/// User-editable profile fields. `None` leaves the stored value untouched.
///
/// Computed targets are not part of it; unknown fields are refused when
/// deserializing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub height_cm: Option<f64>,
    pub current_weight_kg: Option<f64>,
    pub target_weight_kg: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub primary_goal: Option<PrimaryGoal>,
    pub weekly_goal_kg: Option<f64>,
    pub target_date: Option<NaiveDate>,
    pub diet_type: Option<DietType>,
    pub allergies: Option<Vec<String>>,
    pub disliked_foods: Option<Vec<String>>,
    pub favorite_cuisines: Option<Vec<String>>,
    pub budget_level: Option<BudgetLevel>,
    pub cooking_skill: Option<CookingSkill>,
    pub meal_prep_time_minutes: Option<i32>,
    pub servings_per_meal: Option<i32>,
}

/// Computed daily nutrition targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetsUpdate {
    pub daily_calories_target: i32,
    pub daily_protein_g: i32,
    pub daily_carbs_g: i32,
    pub daily_fat_g: i32,
    /// Set when the macro split had to be clamped.
    pub targets_need_review: bool,
}

/// Everything written when the onboarding wizard is committed.
#[derive(Debug, Clone)]
pub struct OnboardingCommit {
    pub primary_goal: PrimaryGoal,
    pub weekly_goal_kg: f64,
    pub target_date: Option<NaiveDate>,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub height_cm: f64,
    pub current_weight_kg: f64,
    pub target_weight_kg: Option<f64>,
    pub activity_level: ActivityLevel,
    pub diet_type: DietType,
    pub allergies: Vec<String>,
    pub disliked_foods: Vec<String>,
    pub favorite_cuisines: Vec<String>,
    pub budget_level: BudgetLevel,
    pub cooking_skill: CookingSkill,
    pub meal_prep_time_minutes: i32,
    pub servings_per_meal: i32,
    pub targets: TargetsUpdate,
}

/// Onboarding step value recorded once the wizard is committed.
pub const ONBOARDING_DONE_STEP: i32 = 5;

/// Create the profile row for a newly authenticated user.
///
/// Idempotent: an existing row is returned unchanged.
pub async fn create_profile(
    pool: &PgPool,
    id: Uuid,
    email: Option<&str>,
    full_name: Option<&str>,
) -> Result<Profile> {
    sqlx::query(
        "INSERT INTO profiles (id, email, full_name) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(id)
    .bind(email)
    .bind(full_name)
    .execute(pool)
    .await
    .context("failed to insert profile")?;

    get_profile(pool, id)
        .await?
        .with_context(|| format!("profile {id} missing after insert"))
}

/// Fetch a profile by user ID.
pub async fn get_profile(pool: &PgPool, id: Uuid) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch profile")?;

    Ok(profile)
}

/// Apply a partial update. Returns `None` if the profile does not exist.
pub async fn update_profile(
    pool: &PgPool,
    id: Uuid,
    update: &ProfileUpdate,
) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>(
        "UPDATE profiles SET \
            full_name = COALESCE($2, full_name), \
            date_of_birth = COALESCE($3, date_of_birth), \
            gender = COALESCE($4, gender), \
            height_cm = COALESCE($5, height_cm), \
            current_weight_kg = COALESCE($6, current_weight_kg), \
            target_weight_kg = COALESCE($7, target_weight_kg), \
            activity_level = COALESCE($8, activity_level), \
            primary_goal = COALESCE($9, primary_goal), \
            weekly_goal_kg = COALESCE($10, weekly_goal_kg), \
            target_date = COALESCE($11, target_date), \
            diet_type = COALESCE($12, diet_type), \
            allergies = COALESCE($13, allergies), \
            disliked_foods = COALESCE($14, disliked_foods), \
            favorite_cuisines = COALESCE($15, favorite_cuisines), \
            budget_level = COALESCE($16, budget_level), \
            cooking_skill = COALESCE($17, cooking_skill), \
            meal_prep_time_minutes = COALESCE($18, meal_prep_time_minutes), \
            servings_per_meal = COALESCE($19, servings_per_meal), \
            updated_at = now() \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(id)
    .bind(update.full_name.as_deref())
    .bind(update.date_of_birth)
    .bind(update.gender)
    .bind(update.height_cm)
    .bind(update.current_weight_kg)
    .bind(update.target_weight_kg)
    .bind(update.activity_level)
    .bind(update.primary_goal)
    .bind(update.weekly_goal_kg)
    .bind(update.target_date)
    .bind(update.diet_type)
    .bind(update.allergies.as_deref())
    .bind(update.disliked_foods.as_deref())
    .bind(update.favorite_cuisines.as_deref())
    .bind(update.budget_level)
    .bind(update.cooking_skill)
    .bind(update.meal_prep_time_minutes)
    .bind(update.servings_per_meal)
    .fetch_optional(pool)
    .await
    .context("failed to update profile")?;

    Ok(profile)
}

/// Overwrite the computed nutrition targets.
pub async fn set_targets(
    pool: &PgPool,
    id: Uuid,
    targets: &TargetsUpdate,
) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>(
        "UPDATE profiles SET \
            daily_calories_target = $2, \
            daily_protein_g = $3, \
            daily_carbs_g = $4, \
            daily_fat_g = $5, \
            targets_need_review = $6, \
            updated_at = now() \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(id)
    .bind(targets.daily_calories_target)
    .bind(targets.daily_protein_g)
    .bind(targets.daily_carbs_g)
    .bind(targets.daily_fat_g)
    .bind(targets.targets_need_review)
    .fetch_optional(pool)
    .await
    .context("failed to update nutrition targets")?;

    Ok(profile)
}

/// Record progress through the onboarding wizard. The step never moves
/// backwards.
pub async fn advance_onboarding_step(pool: &PgPool, id: Uuid, step: i32) -> Result<()> {
    let result = sqlx::query(
        "UPDATE profiles \
         SET onboarding_step = GREATEST(onboarding_step, $2), updated_at = now() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(step)
    .execute(pool)
    .await
    .context("failed to update onboarding step")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("profile {id} not found");
    }

    Ok(())
}

/// Write every onboarding answer plus the computed targets in one statement
/// and mark onboarding complete.
pub async fn commit_onboarding(
    pool: &PgPool,
    id: Uuid,
    commit: &OnboardingCommit,
) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>(
        "UPDATE profiles SET \
            primary_goal = $2, \
            weekly_goal_kg = $3, \
            target_date = $4, \
            date_of_birth = $5, \
            gender = $6, \
            height_cm = $7, \
            current_weight_kg = $8, \
            target_weight_kg = $9, \
            activity_level = $10, \
            diet_type = $11, \
            allergies = $12, \
            disliked_foods = $13, \
            favorite_cuisines = $14, \
            budget_level = $15, \
            cooking_skill = $16, \
            meal_prep_time_minutes = $17, \
            servings_per_meal = $18, \
            daily_calories_target = $19, \
            daily_protein_g = $20, \
            daily_carbs_g = $21, \
            daily_fat_g = $22, \
            targets_need_review = $23, \
            onboarding_completed = TRUE, \
            onboarding_step = $24, \
            updated_at = now() \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(id)
    .bind(commit.primary_goal)
    .bind(commit.weekly_goal_kg)
    .bind(commit.target_date)
    .bind(commit.date_of_birth)
    .bind(commit.gender)
    .bind(commit.height_cm)
    .bind(commit.current_weight_kg)
    .bind(commit.target_weight_kg)
    .bind(commit.activity_level)
    .bind(commit.diet_type)
    .bind(&commit.allergies)
    .bind(&commit.disliked_foods)
    .bind(&commit.favorite_cuisines)
    .bind(commit.budget_level)
    .bind(commit.cooking_skill)
    .bind(commit.meal_prep_time_minutes)
    .bind(commit.servings_per_meal)
    .bind(commit.targets.daily_calories_target)
    .bind(commit.targets.daily_protein_g)
    .bind(commit.targets.daily_carbs_g)
    .bind(commit.targets.daily_fat_g)
    .bind(commit.targets.targets_need_review)
    .bind(ONBOARDING_DONE_STEP)
    .fetch_optional(pool)
    .await
    .context("failed to commit onboarding")?;

    Ok(profile)
}

/// Copy the weight of the user's most recent log (by log date) onto the
/// profile. Returns the cached weight, or `None` when the user has no logs
/// and the profile was left as it was.
pub async fn sync_current_weight(pool: &PgPool, id: Uuid) -> Result<Option<f64>> {
    let weight = sqlx::query_scalar::<_, Option<f64>>(
        "UPDATE profiles p SET current_weight_kg = w.weight_kg, updated_at = now() \
         FROM (SELECT weight_kg FROM weight_logs \
               WHERE user_id = $1 ORDER BY logged_at DESC LIMIT 1) w \
         WHERE p.id = $1 \
         RETURNING p.current_weight_kg",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to sync current weight")?
    .flatten();

    Ok(weight)
}
