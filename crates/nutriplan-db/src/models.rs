use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Error returned when a string does not name a variant of one of the
/// text-backed enums below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for EnumParseError {}

/// Declare an enum stored as snake_case `TEXT` in Postgres, with matching
/// serde names, `Display`, `FromStr` and an `ALL` listing.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
        #[sqlx(type_name = "text", rename_all = "snake_case")]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = EnumParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(EnumParseError {
                        kind: $kind,
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

text_enum! {
    /// Self-reported gender. Only `Male` and `Female` select a BMR formula
    /// directly; the others go through an explicit policy.
    Gender ("gender") {
        Male => "male",
        Female => "female",
        Other => "other",
        PreferNotToSay => "prefer_not_to_say",
    }
}

text_enum! {
    /// Habitual activity, used to scale BMR into TDEE.
    ActivityLevel ("activity level") {
        Sedentary => "sedentary",
        LightlyActive => "lightly_active",
        ModeratelyActive => "moderately_active",
        VeryActive => "very_active",
        ExtremelyActive => "extremely_active",
    }
}

text_enum! {
    PrimaryGoal ("primary goal") {
        LoseWeight => "lose_weight",
        GainWeight => "gain_weight",
        BuildMuscle => "build_muscle",
        MaintainWeight => "maintain_weight",
        BodyRecomposition => "body_recomposition",
    }
}

text_enum! {
    DietType ("diet type") {
        Standard => "standard",
        Vegetarian => "vegetarian",
        Vegan => "vegan",
        Pescatarian => "pescatarian",
        Keto => "keto",
        Paleo => "paleo",
        Mediterranean => "mediterranean",
        Halal => "halal",
        Kosher => "kosher",
    }
}

text_enum! {
    BudgetLevel ("budget level") {
        Budget => "budget",
        Moderate => "moderate",
        Premium => "premium",
    }
}

text_enum! {
    CookingSkill ("cooking skill") {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Advanced => "advanced",
    }
}

text_enum! {
    /// Meal slot within a day. Declaration order is the display order.
    MealType ("meal type") {
        Breakfast => "breakfast",
        Lunch => "lunch",
        Dinner => "dinner",
        Snack => "snack",
    }
}

text_enum! {
    Difficulty ("difficulty") {
        Easy => "easy",
        Medium => "medium",
        Hard => "hard",
    }
}

text_enum! {
    /// How the user felt after a logged meal.
    Mood ("mood") {
        Great => "great",
        Good => "good",
        Okay => "okay",
        Bad => "bad",
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `profiles` table.
///
/// The `daily_*` columns are computed by the nutrition calculator and are
/// never written from user input.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
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
    pub allergies: Vec<String>,
    pub disliked_foods: Vec<String>,
    pub favorite_cuisines: Vec<String>,
    pub budget_level: Option<BudgetLevel>,
    pub cooking_skill: Option<CookingSkill>,
    pub meal_prep_time_minutes: Option<i32>,
    pub servings_per_meal: Option<i32>,
    pub daily_calories_target: Option<i32>,
    pub daily_protein_g: Option<i32>,
    pub daily_carbs_g: Option<i32>,
    pub daily_fat_g: Option<i32>,
    pub targets_need_review: bool,
    pub onboarding_completed: bool,
    pub onboarding_step: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `onboarding_drafts` table. `data` holds the partially
/// completed wizard as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OnboardingDraftRow {
    pub user_id: Uuid,
    pub data: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `meal_plans` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MealPlan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i32,
    pub avg_daily_calories: Option<i32>,
    pub avg_daily_protein_g: Option<i32>,
    pub avg_daily_carbs_g: Option<i32>,
    pub avg_daily_fat_g: Option<i32>,
    pub estimated_total_cost: Option<f64>,
    pub is_active: bool,
    /// The generation request that produced this plan.
    pub generation_prompt: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry of a recipe's ingredient list (stored as JSONB).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub name: String,
    pub amount: f64,
    pub unit: String,
}

/// One numbered instruction step (stored as JSONB).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeStep {
    pub step: i32,
    pub text: String,
}

/// A row from the `recipes` table. Nutrition values are per serving.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub prep_time_minutes: Option<i32>,
    pub cook_time_minutes: Option<i32>,
    pub total_time_minutes: Option<i32>,
    pub servings: i32,
    pub difficulty: Option<Difficulty>,
    pub calories: Option<i32>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub fiber_g: Option<f64>,
    pub ingredients: Json<Vec<RecipeIngredient>>,
    pub instructions: Json<Vec<RecipeStep>>,
    pub cuisine: Option<String>,
    pub meal_type: Option<MealType>,
    pub tags: Vec<String>,
    pub estimated_cost: Option<f64>,
    pub cost_per_serving: Option<f64>,
    pub is_ai_generated: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `meal_plan_items` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MealPlanItem {
    pub id: Uuid,
    pub meal_plan_id: Uuid,
    pub recipe_id: Option<Uuid>,
    pub plan_date: NaiveDate,
    pub meal_type: MealType,
    pub meal_order: i32,
    pub servings: i32,
    pub recipe_name: Option<String>,
    pub calories: Option<i32>,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `shopping_lists` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShoppingList {
    pub id: Uuid,
    pub user_id: Uuid,
    pub meal_plan_id: Option<Uuid>,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub estimated_total_cost: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `shopping_list_items` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShoppingListItem {
    pub id: Uuid,
    pub shopping_list_id: Uuid,
    pub ingredient_name: String,
    pub quantity: f64,
    pub unit: String,
    pub category: String,
    pub estimated_cost: Option<f64>,
    pub notes: Option<String>,
    pub is_purchased: bool,
    pub purchased_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `weight_logs` table. At most one per user per day.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WeightLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub weight_kg: f64,
    pub logged_at: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `food_logs` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FoodLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub logged_at: DateTime<Utc>,
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
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_roundtrip<T>(all: &[T])
    where
        T: fmt::Display + FromStr<Err = EnumParseError> + PartialEq + fmt::Debug + Serialize,
    {
        for v in all {
            let s = v.to_string();
            let parsed: T = s.parse().unwrap();
            assert_eq!(&parsed, v);
            // serde and Display must agree, the database sees the same text.
            let json = serde_json::to_string(v).unwrap();
            assert_eq!(json, format!("\"{s}\""));
        }
    }

    #[test]
    fn every_enum_roundtrips_through_text() {
        assert_roundtrip(Gender::ALL);
        assert_roundtrip(ActivityLevel::ALL);
        assert_roundtrip(PrimaryGoal::ALL);
        assert_roundtrip(DietType::ALL);
        assert_roundtrip(BudgetLevel::ALL);
        assert_roundtrip(CookingSkill::ALL);
        assert_roundtrip(MealType::ALL);
        assert_roundtrip(Difficulty::ALL);
        assert_roundtrip(Mood::ALL);
    }

    #[test]
    fn multi_word_variants_use_snake_case() {
        assert_eq!(Gender::PreferNotToSay.to_string(), "prefer_not_to_say");
        assert_eq!(ActivityLevel::ExtremelyActive.to_string(), "extremely_active");
        assert_eq!(PrimaryGoal::BodyRecomposition.to_string(), "body_recomposition");
    }

    #[test]
    fn parse_rejects_unknown_values() {
        let err = "brunch".parse::<MealType>().unwrap_err();
        assert_eq!(err.kind, "meal type");
        assert_eq!(err.to_string(), "invalid meal type: \"brunch\"");
        assert!("Breakfast".parse::<MealType>().is_err());
    }

    #[test]
    fn meal_type_order_matches_day_order() {
        let mut types = vec![MealType::Snack, MealType::Dinner, MealType::Breakfast];
        types.sort_by_key(|t| MealType::ALL.iter().position(|x| x == t));
        assert_eq!(
            types,
            vec![MealType::Breakfast, MealType::Dinner, MealType::Snack]
        );
    }

    #[test]
    fn recipe_json_columns_serialize_transparently() {
        let steps = Json(vec![RecipeStep {
            step: 1,
            text: "Boil water".to_owned(),
        }]);
        let value = serde_json::to_value(&steps).unwrap();
        assert_eq!(value, serde_json::json!([{ "step": 1, "text": "Boil water" }]));
    }
}
