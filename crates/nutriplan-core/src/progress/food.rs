//! Food log and daily intake.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use nutriplan_db::models::{FoodLog, MealType, Mood};
use nutriplan_db::queries::food_logs::{self, NewFoodLog};
use nutriplan_db::queries::profiles;

use crate::auth::Identity;
use crate::error::{ServiceError, ServiceResult};
use crate::generator::{MealPlanGenerator, PhotoAnalysis};

pub const LIST_LIMIT: i64 = 50;
/// Decoded photos larger than this are refused before reaching the generator.
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

/// A food entry as submitted by the user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FoodLogInput {
    pub meal_type: MealType,
    pub food_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub recipe_id: Option<Uuid>,
    #[serde(default = "one")]
    pub servings: f64,
    #[serde(default)]
    pub calories: Option<i32>,
    #[serde(default)]
    pub protein_g: Option<f64>,
    #[serde(default)]
    pub carbs_g: Option<f64>,
    #[serde(default)]
    pub fat_g: Option<f64>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub photo_analysis: Option<PhotoAnalysis>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub mood: Option<Mood>,
    /// Defaults to now.
    #[serde(default)]
    pub logged_at: Option<DateTime<Utc>>,
}

fn one() -> f64 {
    1.0
}

fn blank_to_none(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

impl FoodLogInput {
    pub fn validate(&self) -> ServiceResult<()> {
        if self.food_name.trim().is_empty() {
            return Err(ServiceError::invalid("food_name must not be empty"));
        }
        if !(self.servings.is_finite() && self.servings > 0.0) {
            return Err(ServiceError::invalid("servings must be greater than zero"));
        }
        if self.calories.is_some_and(|c| c < 0) {
            return Err(ServiceError::invalid("calories must not be negative"));
        }
        for (field, value) in [
            ("protein_g", self.protein_g),
            ("carbs_g", self.carbs_g),
            ("fat_g", self.fat_g),
        ] {
            if value.is_some_and(|v| !v.is_finite() || v < 0.0) {
                return Err(ServiceError::invalid(format!("{field} must not be negative")));
            }
        }
        Ok(())
    }

    fn into_new(self, user_id: Uuid) -> ServiceResult<NewFoodLog> {
        let photo_analysis = self
            .photo_analysis
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ServiceError::Storage(e.into()))?;

        Ok(NewFoodLog {
            user_id,
            logged_at: self.logged_at,
            meal_type: self.meal_type,
            recipe_id: self.recipe_id,
            food_name: self.food_name.trim().to_owned(),
            description: blank_to_none(&self.description),
            servings: self.servings,
            calories: self.calories,
            protein_g: self.protein_g,
            carbs_g: self.carbs_g,
            fat_g: self.fat_g,
            photo_url: blank_to_none(&self.photo_url),
            photo_analysis,
            notes: blank_to_none(&self.notes),
            mood: self.mood,
        })
    }
}

pub async fn create_food_log(
    pool: &PgPool,
    identity: Identity,
    input: FoodLogInput,
) -> ServiceResult<FoodLog> {
    let user_id = identity.require()?;
    input.validate()?;
    let log = food_logs::insert_food_log(pool, &input.into_new(user_id)?).await?;
    tracing::debug!(user_id = %user_id, food_log_id = %log.id, "logged food");
    Ok(log)
}

/// The UTC day `[date, date + 1)`.
pub fn day_window(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
    let end = date
        .checked_add_days(Days::new(1))
        .map_or(DateTime::<Utc>::MAX_UTC, |d| {
            d.and_time(chrono::NaiveTime::MIN).and_utc()
        });
    (start, end)
}

/// The latest entries, newest first, optionally limited to one day.
pub async fn list_food_logs(
    pool: &PgPool,
    identity: Identity,
    date: Option<NaiveDate>,
) -> ServiceResult<Vec<FoodLog>> {
    let user_id = identity.require()?;
    Ok(food_logs::list_food_logs(pool, user_id, date.map(day_window), LIST_LIMIT).await?)
}

pub async fn delete_food_log(pool: &PgPool, identity: Identity, id: Uuid) -> ServiceResult<()> {
    let user_id = identity.require()?;
    if food_logs::delete_food_log(pool, user_id, id).await? {
        Ok(())
    } else {
        Err(ServiceError::not_found("food log"))
    }
}

/// What was eaten on one day, next to the profile's targets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyIntake {
    pub date: NaiveDate,
    pub calories: i64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub meal_count: i64,
    pub calorie_target: Option<i32>,
    pub protein_target_g: Option<i32>,
    pub carbs_target_g: Option<i32>,
    pub fat_target_g: Option<i32>,
}

pub async fn today_stats(
    pool: &PgPool,
    identity: Identity,
    today: NaiveDate,
) -> ServiceResult<DailyIntake> {
    let user_id = identity.require()?;
    let (from, to) = day_window(today);
    let totals = food_logs::intake_totals(pool, user_id, from, to).await?;
    let profile = profiles::get_profile(pool, user_id).await?;

    Ok(DailyIntake {
        date: today,
        calories: totals.calories,
        protein_g: totals.protein_g,
        carbs_g: totals.carbs_g,
        fat_g: totals.fat_g,
        meal_count: totals.meal_count,
        calorie_target: profile.as_ref().and_then(|p| p.daily_calories_target),
        protein_target_g: profile.as_ref().and_then(|p| p.daily_protein_g),
        carbs_target_g: profile.as_ref().and_then(|p| p.daily_carbs_g),
        fat_target_g: profile.as_ref().and_then(|p| p.daily_fat_g),
    })
}

// ---------------------------------------------------------------------------
// Photo analysis
// ---------------------------------------------------------------------------

/// Strip an optional `data:` URL prefix and check the payload is base64.
pub fn normalize_photo(image: &str) -> ServiceResult<&str> {
    let payload = match image.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => image,
    }
    .trim();

    if payload.is_empty() {
        return Err(ServiceError::invalid("photo is empty"));
    }
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| ServiceError::invalid(format!("photo is not valid base64: {e}")))?;
    if bytes.len() > MAX_PHOTO_BYTES {
        return Err(ServiceError::invalid(format!(
            "photo exceeds {MAX_PHOTO_BYTES} bytes"
        )));
    }
    Ok(payload)
}

/// Ask the generator what is on the plate.
pub async fn analyze_food_photo(
    generator: &dyn MealPlanGenerator,
    identity: Identity,
    image_base64: &str,
) -> ServiceResult<PhotoAnalysis> {
    let user_id = identity.require()?;
    let payload = normalize_photo(image_base64)?;
    let analysis = generator.analyze_food_photo(payload).await?;
    tracing::debug!(
        user_id = %user_id,
        food = %analysis.food_name,
        confidence = ?analysis.confidence,
        "analyzed food photo"
    );
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> FoodLogInput {
        serde_json::from_value(serde_json::json!({
            "meal_type": "lunch",
            "food_name": "  Chicken wrap ",
            "calories": 520,
            "notes": "   ",
        }))
        .unwrap()
    }

    #[test]
    fn input_defaults_and_trims() {
        let input = input();
        assert_eq!(input.servings, 1.0);
        input.validate().unwrap();
        let new = input.into_new(Uuid::nil()).unwrap();
        assert_eq!(new.food_name, "Chicken wrap");
        assert_eq!(new.notes, None);
        assert_eq!(new.logged_at, None);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let mut blank = input();
        blank.food_name = " ".to_owned();
        assert!(blank.validate().is_err());

        let mut zero = input();
        zero.servings = 0.0;
        assert!(zero.validate().is_err());

        let mut negative = input();
        negative.fat_g = Some(-1.0);
        assert!(negative.validate().is_err());
    }

    #[test]
    fn photo_analysis_is_stored_as_json() {
        let mut input = input();
        input.photo_analysis = Some(PhotoAnalysis {
            food_name: "Wrap".to_owned(),
            estimated_calories: Some(500.0),
            ..PhotoAnalysis::default()
        });
        let new = input.into_new(Uuid::nil()).unwrap();
        assert_eq!(new.photo_analysis.unwrap()["foodName"], "Wrap");
    }

    #[test]
    fn day_window_spans_one_utc_day() {
        let (from, to) = day_window(NaiveDate::from_ymd_opt(2024, 2, 28).unwrap());
        assert_eq!(from.to_rfc3339(), "2024-02-28T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2024-02-29T00:00:00+00:00");
    }

    #[test]
    fn photo_payloads_are_normalized() {
        assert_eq!(normalize_photo("QUJD").unwrap(), "QUJD");
        assert_eq!(
            normalize_photo("data:image/jpeg;base64,QUJD").unwrap(),
            "QUJD"
        );
        assert!(normalize_photo("  ").is_err());
        assert!(normalize_photo("not base64!").is_err());
    }
}
