//! Validation pass between the generator and the database.
//!
//! Every candidate meal either becomes a well-formed [`SanitizedMeal`] or is
//! dropped with a [`MealRejection`]. Numeric fields are clamped into ranges
//! the schema accepts, so the only inserts that can still fail are the ones
//! the store itself refuses.

use std::str::FromStr;

use thiserror::Error;

use nutriplan_db::models::{Difficulty, MealType, RecipeIngredient, RecipeStep};
use nutriplan_db::queries::recipes::NewRecipe;

use super::candidate::{CandidateMeal, CandidatePlan, CandidateShoppingItem};

pub const MAX_CALORIES: f64 = 5000.0;
pub const MAX_MACRO_G: f64 = 500.0;
pub const MAX_MINUTES: f64 = 1440.0;
pub const MAX_SERVINGS: f64 = 100.0;
pub const DEFAULT_SHOPPING_CATEGORY: &str = "Other";

/// Why a candidate meal was not saved.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MealRejection {
    #[error("day {0} is outside the plan")]
    DayOutOfRange(i64),

    #[error("meal has no name")]
    MissingName,

    #[error("unknown meal type {0:?}")]
    UnknownMealType(String),

    #[error("meal has no usable ingredients")]
    NoIngredients,

    #[error("meal has no instructions")]
    NoInstructions,

    #[error("meal has no calorie value")]
    MissingCalories,
}

/// A meal that passed validation, placed on a plan day.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedMeal {
    /// 1-based day within the plan.
    pub day: u32,
    /// Position of the meal within its day, as the generator ordered it.
    pub meal_order: i32,
    pub meal_type: MealType,
    pub recipe: NewRecipe,
}

/// A candidate meal that did not pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedMeal {
    pub day: i64,
    pub name: String,
    pub reason: MealRejection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedShoppingItem {
    pub ingredient_name: String,
    pub quantity: f64,
    pub unit: String,
    pub category: String,
    pub estimated_cost: Option<f64>,
}

/// The generator's answer with everything unusable stripped out.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedPlan {
    pub name: Option<String>,
    pub description: Option<String>,
    pub total_estimated_cost: Option<f64>,
    /// Meals the generator returned, valid or not.
    pub meals_generated: usize,
    pub meals: Vec<SanitizedMeal>,
    pub rejected: Vec<RejectedMeal>,
    pub shopping_items: Vec<SanitizedShoppingItem>,
    pub shopping_items_rejected: usize,
}

/// Cost of one serving. Servings below one count as one.
pub fn cost_per_serving(estimated_cost: f64, servings: i32) -> f64 {
    estimated_cost / f64::from(servings.max(1))
}

/// Validate a candidate plan for a plan of `number_of_days` days.
///
/// Days without an explicit index take their position in the list.
pub fn sanitize_plan(candidate: &CandidatePlan, number_of_days: u32) -> SanitizedPlan {
    let mut meals = Vec::new();
    let mut rejected = Vec::new();

    for (position, day) in candidate.days.iter().enumerate() {
        let index = day.day.map_or(position as i64 + 1, |d| d.round() as i64);
        let in_range = index >= 1 && index <= i64::from(number_of_days);

        for (order, meal) in day.meals.iter().enumerate() {
            let outcome = if in_range {
                sanitize_meal(meal)
            } else {
                Err(MealRejection::DayOutOfRange(index))
            };
            match outcome {
                Ok((meal_type, recipe)) => meals.push(SanitizedMeal {
                    day: index as u32,
                    meal_order: order as i32,
                    meal_type,
                    recipe,
                }),
                Err(reason) => rejected.push(RejectedMeal {
                    day: index,
                    name: meal.name.trim().to_owned(),
                    reason,
                }),
            }
        }
    }

    let mut shopping_items = Vec::new();
    let mut shopping_items_rejected = 0;
    for group in &candidate.shopping_list {
        let category = non_empty(group.category.as_deref())
            .unwrap_or_else(|| DEFAULT_SHOPPING_CATEGORY.to_owned());
        for item in &group.items {
            match sanitize_shopping_item(item, &category) {
                Some(item) => shopping_items.push(item),
                None => shopping_items_rejected += 1,
            }
        }
    }

    SanitizedPlan {
        name: non_empty(Some(&candidate.name)),
        description: non_empty(candidate.description.as_deref()),
        total_estimated_cost: candidate.total_estimated_cost.map(non_negative),
        meals_generated: candidate.meal_count(),
        meals,
        rejected,
        shopping_items,
        shopping_items_rejected,
    }
}

/// Validate one meal and turn it into an insertable recipe.
///
/// `created_by` is left empty; the caller knows who is generating.
pub fn sanitize_meal(meal: &CandidateMeal) -> Result<(MealType, NewRecipe), MealRejection> {
    let name = non_empty(Some(&meal.name)).ok_or(MealRejection::MissingName)?;

    let raw_type = meal.meal_type.as_deref().unwrap_or_default();
    let meal_type = MealType::from_str(&raw_type.trim().to_ascii_lowercase())
        .map_err(|_| MealRejection::UnknownMealType(raw_type.to_owned()))?;

    let ingredients: Vec<RecipeIngredient> = meal
        .ingredients
        .iter()
        .filter_map(|i| {
            Some(RecipeIngredient {
                name: non_empty(Some(&i.name))?,
                amount: i.amount.map_or(0.0, non_negative),
                unit: i.unit.as_deref().map(str::trim).unwrap_or_default().to_owned(),
            })
        })
        .collect();
    if ingredients.is_empty() {
        return Err(MealRejection::NoIngredients);
    }

    let instructions: Vec<RecipeStep> = meal
        .instructions
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(i, text)| RecipeStep {
            step: i as i32 + 1,
            text: text.to_owned(),
        })
        .collect();
    if instructions.is_empty() {
        return Err(MealRejection::NoInstructions);
    }

    let calories = meal
        .calories
        .map(|c| clamp(c, MAX_CALORIES).round() as i32)
        .ok_or(MealRejection::MissingCalories)?;

    let servings = meal
        .servings
        .map_or(1.0, |s| s.round().clamp(1.0, MAX_SERVINGS)) as i32;
    let estimated_cost = meal.estimated_cost.map(non_negative);

    let recipe = NewRecipe {
        name,
        description: non_empty(meal.description.as_deref()),
        prep_time_minutes: meal.prep_time.map(minutes),
        cook_time_minutes: meal.cook_time.map(minutes),
        servings,
        difficulty: meal
            .difficulty
            .as_deref()
            .and_then(|d| Difficulty::from_str(&d.trim().to_ascii_lowercase()).ok()),
        calories: Some(calories),
        protein_g: meal.protein.map(grams),
        carbs_g: meal.carbs.map(grams),
        fat_g: meal.fat.map(grams),
        fiber_g: meal.fiber.map(grams),
        ingredients,
        instructions,
        cuisine: non_empty(meal.cuisine.as_deref()),
        meal_type: Some(meal_type),
        tags: meal
            .tags
            .iter()
            .filter_map(|t| non_empty(Some(t)))
            .collect(),
        estimated_cost,
        cost_per_serving: estimated_cost.map(|c| cost_per_serving(c, servings)),
        is_ai_generated: true,
        created_by: None,
    };

    Ok((meal_type, recipe))
}

fn sanitize_shopping_item(
    item: &CandidateShoppingItem,
    category: &str,
) -> Option<SanitizedShoppingItem> {
    Some(SanitizedShoppingItem {
        ingredient_name: non_empty(Some(&item.name))?,
        quantity: item.amount.map_or(0.0, non_negative),
        unit: item.unit.as_deref().map(str::trim).unwrap_or_default().to_owned(),
        category: category.to_owned(),
        estimated_cost: item.estimated_cost.map(non_negative),
    })
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned)
}

fn clamp(value: f64, max: f64) -> f64 {
    value.clamp(0.0, max)
}

fn non_negative(value: f64) -> f64 {
    value.max(0.0)
}

fn minutes(value: f64) -> i32 {
    clamp(value, MAX_MINUTES).round() as i32
}

fn grams(value: f64) -> f64 {
    clamp(value, MAX_MACRO_G)
}
