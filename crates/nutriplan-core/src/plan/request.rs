//! Turning a profile and a few options into a generation request.

use serde::{Deserialize, Serialize};

use nutriplan_db::models::{BudgetLevel, CookingSkill, DietType, Profile};

use crate::error::{ServiceError, ServiceResult};

/// Fallback targets for profiles that have not computed their own.
pub const DEFAULT_DAILY_CALORIES: i32 = 2000;
pub const DEFAULT_DAILY_PROTEIN_G: i32 = 150;
pub const DEFAULT_DAILY_CARBS_G: i32 = 200;
pub const DEFAULT_DAILY_FAT_G: i32 = 70;
pub const DEFAULT_MAX_PREP_TIME_MINUTES: i32 = 45;
pub const DEFAULT_SERVINGS_PER_MEAL: i32 = 1;

/// Longest plan the generator is asked for in one go.
pub const MAX_PLAN_DAYS: u32 = 14;

/// What the user picked on the generate screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub number_of_days: u32,
    #[serde(default)]
    pub include_snacks: bool,
}

impl GenerationOptions {
    pub fn validate(&self) -> ServiceResult<()> {
        if !(1..=MAX_PLAN_DAYS).contains(&self.number_of_days) {
            return Err(ServiceError::invalid(format!(
                "number_of_days must be between 1 and {MAX_PLAN_DAYS}, got {}",
                self.number_of_days
            )));
        }
        Ok(())
    }

    pub fn meals_per_day(&self) -> u32 {
        if self.include_snacks { 4 } else { 3 }
    }
}

/// Everything the generator needs to know. Stored verbatim on the plan for
/// auditing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub daily_calories: i32,
    pub daily_protein_g: i32,
    pub daily_carbs_g: i32,
    pub daily_fat_g: i32,
    pub diet_type: DietType,
    pub allergies: Vec<String>,
    pub disliked_foods: Vec<String>,
    pub favorite_cuisines: Vec<String>,
    pub cooking_skill: CookingSkill,
    pub max_prep_time_minutes: i32,
    pub budget_level: BudgetLevel,
    pub servings_per_meal: i32,
    pub number_of_days: u32,
    pub meals_per_day: u32,
}

impl GenerationRequest {
    pub fn expected_meals(&self) -> usize {
        (self.number_of_days * self.meals_per_day) as usize
    }
}

/// Map a profile onto a request, filling gaps with defaults.
pub fn build_request(
    profile: &Profile,
    options: &GenerationOptions,
) -> ServiceResult<GenerationRequest> {
    options.validate()?;

    Ok(GenerationRequest {
        daily_calories: profile.daily_calories_target.unwrap_or(DEFAULT_DAILY_CALORIES),
        daily_protein_g: profile.daily_protein_g.unwrap_or(DEFAULT_DAILY_PROTEIN_G),
        daily_carbs_g: profile.daily_carbs_g.unwrap_or(DEFAULT_DAILY_CARBS_G),
        daily_fat_g: profile.daily_fat_g.unwrap_or(DEFAULT_DAILY_FAT_G),
        diet_type: profile.diet_type.unwrap_or(DietType::Standard),
        allergies: profile.allergies.clone(),
        disliked_foods: profile.disliked_foods.clone(),
        favorite_cuisines: profile.favorite_cuisines.clone(),
        cooking_skill: profile.cooking_skill.unwrap_or(CookingSkill::Intermediate),
        max_prep_time_minutes: profile
            .meal_prep_time_minutes
            .unwrap_or(DEFAULT_MAX_PREP_TIME_MINUTES),
        budget_level: profile.budget_level.unwrap_or(BudgetLevel::Moderate),
        servings_per_meal: profile
            .servings_per_meal
            .unwrap_or(DEFAULT_SERVINGS_PER_MEAL),
        number_of_days: options.number_of_days,
        meals_per_day: options.meals_per_day(),
    })
}
