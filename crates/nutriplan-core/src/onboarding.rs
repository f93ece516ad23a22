//! The onboarding wizard, kept server-side as a draft.
//!
//! Each of the four steps is validated and stored on its own. Completing
//! onboarding checks that every step is present, computes the nutrition
//! targets, and writes the whole profile in one statement.

use std::ops::RangeInclusive;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;

use nutriplan_db::models::{
    ActivityLevel, BudgetLevel, CookingSkill, DietType, Gender, PrimaryGoal, Profile,
};
use nutriplan_db::queries::onboarding as draft_queries;
use nutriplan_db::queries::profiles::{self, OnboardingCommit};

use crate::auth::Identity;
use crate::error::{ServiceError, ServiceResult};
use crate::nutrition::{self, BmrFormula, BodyStats, NutritionTargets};

pub const HEIGHT_CM: RangeInclusive<f64> = 50.0..=300.0;
pub const WEIGHT_KG: RangeInclusive<f64> = 20.0..=500.0;
pub const WEEKLY_GOAL_KG: RangeInclusive<f64> = -1.5..=1.5;
pub const AGE_YEARS: RangeInclusive<i32> = 13..=120;
pub const PREP_TIME_MINUTES: RangeInclusive<i32> = 5..=240;
pub const SERVINGS: RangeInclusive<i32> = 1..=12;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OnboardingError {
    #[error("onboarding step {0:?} has not been completed")]
    MissingStep(&'static str),

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: String,
        max: String,
        value: String,
    },

    #[error("target date {0} is in the past")]
    TargetDateInPast(NaiveDate),
}

impl From<OnboardingError> for ServiceError {
    fn from(e: OnboardingError) -> Self {
        ServiceError::InvalidInput(e.to_string())
    }
}

fn check_range<T>(field: &'static str, value: T, range: &RangeInclusive<T>) -> Result<(), OnboardingError>
where
    T: PartialOrd + std::fmt::Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(OnboardingError::OutOfRange {
            field,
            min: range.start().to_string(),
            max: range.end().to_string(),
            value: value.to_string(),
        })
    }
}

/// Trim entries and drop blanks and repeats, keeping first-seen order.
fn clean_list(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim();
        if !item.is_empty() && !out.iter().any(|o| o.eq_ignore_ascii_case(item)) {
            out.push(item.to_owned());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalsStep {
    pub primary_goal: PrimaryGoal,
    pub weekly_goal_kg: f64,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyStatsStep {
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub height_cm: f64,
    pub current_weight_kg: f64,
    #[serde(default)]
    pub target_weight_kg: Option<f64>,
    pub activity_level: ActivityLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietaryStep {
    pub diet_type: DietType,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub disliked_foods: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferencesStep {
    #[serde(default)]
    pub favorite_cuisines: Vec<String>,
    pub budget_level: BudgetLevel,
    pub cooking_skill: CookingSkill,
    pub meal_prep_time_minutes: i32,
    pub servings_per_meal: i32,
}

/// One answered page of the wizard.
#[derive(Debug, Clone, PartialEq)]
pub enum OnboardingStep {
    Goals(GoalsStep),
    BodyStats(BodyStatsStep),
    Dietary(DietaryStep),
    Preferences(PreferencesStep),
}

impl OnboardingStep {
    /// 1-based position in the wizard.
    pub fn number(&self) -> i32 {
        match self {
            Self::Goals(_) => 1,
            Self::BodyStats(_) => 2,
            Self::Dietary(_) => 3,
            Self::Preferences(_) => 4,
        }
    }

    /// Check ranges and normalize free-text lists.
    pub fn validate(self, today: NaiveDate) -> Result<Self, OnboardingError> {
        match self {
            Self::Goals(goals) => {
                check_range("weekly_goal_kg", goals.weekly_goal_kg, &WEEKLY_GOAL_KG)?;
                if let Some(date) = goals.target_date {
                    if date < today {
                        return Err(OnboardingError::TargetDateInPast(date));
                    }
                }
                Ok(Self::Goals(goals))
            }
            Self::BodyStats(stats) => {
                check_range("age", nutrition::age(stats.date_of_birth, today), &AGE_YEARS)?;
                check_range("height_cm", stats.height_cm, &HEIGHT_CM)?;
                check_range("current_weight_kg", stats.current_weight_kg, &WEIGHT_KG)?;
                if let Some(target) = stats.target_weight_kg {
                    check_range("target_weight_kg", target, &WEIGHT_KG)?;
                }
                Ok(Self::BodyStats(stats))
            }
            Self::Dietary(dietary) => Ok(Self::Dietary(DietaryStep {
                allergies: clean_list(&dietary.allergies),
                disliked_foods: clean_list(&dietary.disliked_foods),
                ..dietary
            })),
            Self::Preferences(prefs) => {
                check_range(
                    "meal_prep_time_minutes",
                    prefs.meal_prep_time_minutes,
                    &PREP_TIME_MINUTES,
                )?;
                check_range("servings_per_meal", prefs.servings_per_meal, &SERVINGS)?;
                Ok(Self::Preferences(PreferencesStep {
                    favorite_cuisines: clean_list(&prefs.favorite_cuisines),
                    ..prefs
                }))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// Answers collected so far. Stored as JSON between requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnboardingDraft {
    pub goals: Option<GoalsStep>,
    pub body_stats: Option<BodyStatsStep>,
    pub dietary: Option<DietaryStep>,
    pub preferences: Option<PreferencesStep>,
}

impl OnboardingDraft {
    /// Record a step, replacing any earlier answer for it.
    pub fn apply(&mut self, step: OnboardingStep) {
        match step {
            OnboardingStep::Goals(s) => self.goals = Some(s),
            OnboardingStep::BodyStats(s) => self.body_stats = Some(s),
            OnboardingStep::Dietary(s) => self.dietary = Some(s),
            OnboardingStep::Preferences(s) => self.preferences = Some(s),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing_step().is_none()
    }

    fn missing_step(&self) -> Option<&'static str> {
        if self.goals.is_none() {
            Some("goals")
        } else if self.body_stats.is_none() {
            Some("body_stats")
        } else if self.dietary.is_none() {
            Some("dietary")
        } else if self.preferences.is_none() {
            Some("preferences")
        } else {
            None
        }
    }

    /// Turn a complete draft into the final profile write.
    pub fn build(
        &self,
        today: NaiveDate,
        unspecified_gender: BmrFormula,
    ) -> Result<(OnboardingCommit, NutritionTargets), OnboardingError> {
        let goals = self.goals.as_ref().ok_or(OnboardingError::MissingStep("goals"))?;
        let body = self
            .body_stats
            .as_ref()
            .ok_or(OnboardingError::MissingStep("body_stats"))?;
        let dietary = self
            .dietary
            .as_ref()
            .ok_or(OnboardingError::MissingStep("dietary"))?;
        let prefs = self
            .preferences
            .as_ref()
            .ok_or(OnboardingError::MissingStep("preferences"))?;

        // Steps were validated when saved, but the age moves with the calendar.
        check_range("age", nutrition::age(body.date_of_birth, today), &AGE_YEARS)?;

        let stats = BodyStats {
            date_of_birth: body.date_of_birth,
            gender: body.gender,
            height_cm: body.height_cm,
            weight_kg: body.current_weight_kg,
            activity_level: body.activity_level,
            primary_goal: goals.primary_goal,
            weekly_goal_kg: goals.weekly_goal_kg,
        };
        let targets = nutrition::compute_targets(&stats, today, unspecified_gender);

        let commit = OnboardingCommit {
            primary_goal: goals.primary_goal,
            weekly_goal_kg: goals.weekly_goal_kg,
            target_date: goals.target_date,
            date_of_birth: body.date_of_birth,
            gender: body.gender,
            height_cm: body.height_cm,
            current_weight_kg: body.current_weight_kg,
            target_weight_kg: body.target_weight_kg,
            activity_level: body.activity_level,
            diet_type: dietary.diet_type,
            allergies: dietary.allergies.clone(),
            disliked_foods: dietary.disliked_foods.clone(),
            favorite_cuisines: prefs.favorite_cuisines.clone(),
            budget_level: prefs.budget_level,
            cooking_skill: prefs.cooking_skill,
            meal_prep_time_minutes: prefs.meal_prep_time_minutes,
            servings_per_meal: prefs.servings_per_meal,
            targets: targets.to_update(),
        };

        Ok((commit, targets))
    }
}

// ---------------------------------------------------------------------------
// Service functions
// ---------------------------------------------------------------------------

async fn load_draft(pool: &PgPool, user_id: uuid::Uuid) -> ServiceResult<OnboardingDraft> {
    let Some(row) = draft_queries::get_draft(pool, user_id).await? else {
        return Ok(OnboardingDraft::default());
    };
    match serde_json::from_value(row.data) {
        Ok(draft) => Ok(draft),
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "discarding unreadable onboarding draft");
            Ok(OnboardingDraft::default())
        }
    }
}

pub async fn get_draft(pool: &PgPool, identity: Identity) -> ServiceResult<OnboardingDraft> {
    let user_id = identity.require()?;
    load_draft(pool, user_id).await
}

/// Validate and store one step, and move the profile's wizard position
/// forward.
pub async fn save_step(
    pool: &PgPool,
    identity: Identity,
    step: OnboardingStep,
    today: NaiveDate,
) -> ServiceResult<OnboardingDraft> {
    let user_id = identity.require()?;
    if profiles::get_profile(pool, user_id).await?.is_none() {
        return Err(ServiceError::ProfileNotFound);
    }

    let step = step.validate(today)?;
    let number = step.number();

    let mut draft = load_draft(pool, user_id).await?;
    draft.apply(step);
    let data = serde_json::to_value(&draft).map_err(|e| ServiceError::Storage(e.into()))?;
    draft_queries::upsert_draft(pool, user_id, &data).await?;
    profiles::advance_onboarding_step(pool, user_id, number).await?;

    tracing::debug!(user_id = %user_id, step = number, "saved onboarding step");
    Ok(draft)
}

/// Commit the draft to the profile and discard it.
pub async fn complete_onboarding(
    pool: &PgPool,
    identity: Identity,
    today: NaiveDate,
    unspecified_gender: BmrFormula,
) -> ServiceResult<Profile> {
    let user_id = identity.require()?;
    let draft = load_draft(pool, user_id).await?;
    let (commit, targets) = draft.build(today, unspecified_gender)?;

    if targets.gender_fallback {
        tracing::info!(
            user_id = %user_id,
            formula = ?targets.formula,
            "no BMR formula for gender; using configured fallback"
        );
    }
    if targets.macros.carbs_clamped {
        tracing::warn!(
            user_id = %user_id,
            calories = targets.daily_calories,
            "carbohydrate target clamped to zero; targets flagged for review"
        );
    }

    let profile = profiles::commit_onboarding(pool, user_id, &commit)
        .await?
        .ok_or(ServiceError::ProfileNotFound)?;

    if let Err(e) = draft_queries::delete_draft(pool, user_id).await {
        tracing::warn!(user_id = %user_id, error = %e, "failed to delete onboarding draft");
    }

    tracing::info!(
        user_id = %user_id,
        calories = targets.daily_calories,
        "onboarding completed"
    );
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2024, 6, 14)
    }

    fn goals() -> GoalsStep {
        GoalsStep {
            primary_goal: PrimaryGoal::LoseWeight,
            weekly_goal_kg: -0.5,
            target_date: None,
        }
    }

    fn body() -> BodyStatsStep {
        BodyStatsStep {
            date_of_birth: date(1994, 1, 1),
            gender: Gender::Male,
            height_cm: 175.0,
            current_weight_kg: 70.0,
            target_weight_kg: Some(65.0),
            activity_level: ActivityLevel::ModeratelyActive,
        }
    }

    fn dietary() -> DietaryStep {
        DietaryStep {
            diet_type: DietType::Standard,
            allergies: vec![" peanuts ".to_owned(), "".to_owned(), "Peanuts".to_owned()],
            disliked_foods: Vec::new(),
        }
    }

    fn prefs() -> PreferencesStep {
        PreferencesStep {
            favorite_cuisines: vec!["Italian".to_owned()],
            budget_level: BudgetLevel::Moderate,
            cooking_skill: CookingSkill::Intermediate,
            meal_prep_time_minutes: 30,
            servings_per_meal: 2,
        }
    }

    fn full_draft() -> OnboardingDraft {
        let mut draft = OnboardingDraft::default();
        for step in [
            OnboardingStep::Goals(goals()),
            OnboardingStep::BodyStats(body()),
            OnboardingStep::Dietary(dietary()),
            OnboardingStep::Preferences(prefs()),
        ] {
            draft.apply(step.validate(today()).unwrap());
        }
        draft
    }

    #[test]
    fn steps_are_numbered_in_wizard_order() {
        assert_eq!(OnboardingStep::Goals(goals()).number(), 1);
        assert_eq!(OnboardingStep::Preferences(prefs()).number(), 4);
    }

    #[test]
    fn ranges_are_enforced() {
        let mut g = goals();
        g.weekly_goal_kg = -2.0;
        let err = OnboardingStep::Goals(g).validate(today()).unwrap_err();
        assert!(matches!(err, OnboardingError::OutOfRange { field: "weekly_goal_kg", .. }));

        let mut b = body();
        b.height_cm = 20.0;
        assert!(OnboardingStep::BodyStats(b).validate(today()).is_err());

        let mut b = body();
        b.date_of_birth = date(2015, 1, 1);
        let err = OnboardingStep::BodyStats(b).validate(today()).unwrap_err();
        assert!(matches!(err, OnboardingError::OutOfRange { field: "age", .. }));

        let mut b = body();
        b.current_weight_kg = f64::NAN;
        assert!(OnboardingStep::BodyStats(b).validate(today()).is_err());

        let mut p = prefs();
        p.servings_per_meal = 13;
        assert!(OnboardingStep::Preferences(p).validate(today()).is_err());
    }

    #[test]
    fn past_target_date_is_rejected() {
        let mut g = goals();
        g.target_date = Some(date(2024, 6, 1));
        assert_eq!(
            OnboardingStep::Goals(g).validate(today()).unwrap_err(),
            OnboardingError::TargetDateInPast(date(2024, 6, 1))
        );
    }

    #[test]
    fn lists_are_cleaned() {
        let OnboardingStep::Dietary(d) = OnboardingStep::Dietary(dietary()).validate(today()).unwrap()
        else {
            panic!("expected dietary step");
        };
        assert_eq!(d.allergies, vec!["peanuts".to_owned()]);
    }

    #[test]
    fn incomplete_draft_names_missing_step() {
        let mut draft = OnboardingDraft::default();
        draft.apply(OnboardingStep::Goals(goals()));
        assert!(!draft.is_complete());
        assert_eq!(
            draft.build(today(), BmrFormula::Female).unwrap_err(),
            OnboardingError::MissingStep("body_stats")
        );
    }

    #[test]
    fn complete_draft_builds_commit_with_targets() {
        let draft = full_draft();
        assert!(draft.is_complete());
        let (commit, targets) = draft.build(today(), BmrFormula::Female).unwrap();

        // 70 kg, 175 cm, 30 y male, moderately active, losing 0.5 kg a week.
        assert_eq!(targets.age, 30);
        assert_eq!(targets.tdee, 2556);
        assert_eq!(commit.targets.daily_calories_target, 2006);
        assert_eq!(commit.targets.daily_protein_g, 126);
        assert_eq!(commit.targets.daily_fat_g, 56);
        assert_eq!(commit.targets.daily_carbs_g, 250);
        assert!(!commit.targets.targets_need_review);
        assert_eq!(commit.servings_per_meal, 2);
        assert_eq!(commit.allergies, vec!["peanuts".to_owned()]);
    }

    #[test]
    fn draft_json_round_trips_partially_filled() {
        let mut draft = OnboardingDraft::default();
        draft.apply(OnboardingStep::Dietary(dietary()));
        let value = serde_json::to_value(&draft).unwrap();
        assert!(value["goals"].is_null());
        let back: OnboardingDraft = serde_json::from_value(value).unwrap();
        assert_eq!(back, draft);
    }
}
