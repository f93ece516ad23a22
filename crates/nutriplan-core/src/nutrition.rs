//! Daily energy and macronutrient targets.
//!
//! Everything here is a pure function of its arguments: BMR uses the
//! Mifflin-St Jeor equation, TDEE scales it by an activity multiplier, and
//! the goal decides the calorie adjustment and the macro split.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use nutriplan_db::models::{ActivityLevel, Gender, PrimaryGoal, Profile};
use nutriplan_db::queries::profiles::TargetsUpdate;

/// Energy stored in one kilogram of body fat, in kcal.
pub const KCAL_PER_KG: f64 = 7700.0;

const KCAL_PER_G_PROTEIN: i32 = 4;
const KCAL_PER_G_CARBS: i32 = 4;
const KCAL_PER_G_FAT: i32 = 9;

// ---------------------------------------------------------------------------
// Formula selection
// ---------------------------------------------------------------------------

/// Which sex constant of the Mifflin-St Jeor equation to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BmrFormula {
    /// `+5`
    Male,
    /// `-161`
    #[default]
    Female,
}

impl BmrFormula {
    fn constant(self) -> f64 {
        match self {
            Self::Male => 5.0,
            Self::Female => -161.0,
        }
    }

    /// Pick the formula for a gender. `Other` and `PreferNotToSay` have no
    /// formula of their own and use `unspecified`; the flag reports whether
    /// that happened.
    pub fn for_gender(gender: Gender, unspecified: BmrFormula) -> (Self, bool) {
        match gender {
            Gender::Male => (Self::Male, false),
            Gender::Female => (Self::Female, false),
            Gender::Other | Gender::PreferNotToSay => (unspecified, true),
        }
    }
}

impl std::str::FromStr for BmrFormula {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            other => Err(format!("unknown BMR formula {other:?} (expected male or female)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Core formulas
// ---------------------------------------------------------------------------

/// Round to the nearest integer, halves towards positive infinity.
pub fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

/// Whole years between `date_of_birth` and `as_of`.
pub fn age(date_of_birth: NaiveDate, as_of: NaiveDate) -> i32 {
    let mut years = as_of.year() - date_of_birth.year();
    if (as_of.month(), as_of.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    years
}

/// Basal metabolic rate in kcal/day.
pub fn bmr(weight_kg: f64, height_cm: f64, age_years: i32, formula: BmrFormula) -> f64 {
    10.0 * weight_kg + 6.25 * height_cm - 5.0 * f64::from(age_years) + formula.constant()
}

pub fn activity_multiplier(level: ActivityLevel) -> f64 {
    match level {
        ActivityLevel::Sedentary => 1.2,
        ActivityLevel::LightlyActive => 1.375,
        ActivityLevel::ModeratelyActive => 1.55,
        ActivityLevel::VeryActive => 1.725,
        ActivityLevel::ExtremelyActive => 1.9,
    }
}

/// Parse an activity level, falling back to sedentary for anything unknown.
pub fn parse_activity_level(s: &str) -> ActivityLevel {
    s.trim()
        .to_ascii_lowercase()
        .parse()
        .unwrap_or(ActivityLevel::Sedentary)
}

/// Parse a goal, falling back to maintenance for anything unknown.
pub fn parse_primary_goal(s: &str) -> PrimaryGoal {
    s.trim()
        .to_ascii_lowercase()
        .parse()
        .unwrap_or(PrimaryGoal::MaintainWeight)
}

/// Total daily energy expenditure, rounded to whole kcal.
pub fn tdee(bmr: f64, level: ActivityLevel) -> i32 {
    round_half_up(bmr * activity_multiplier(level))
}

/// Daily calorie target.
///
/// Only goals that aim to change weight apply the weekly rate; the rate
/// carries its own sign.
pub fn calorie_target(tdee: i32, goal: PrimaryGoal, weekly_goal_kg: f64) -> i32 {
    let daily_adjustment = weekly_goal_kg * KCAL_PER_KG / 7.0;
    match goal {
        PrimaryGoal::LoseWeight | PrimaryGoal::GainWeight | PrimaryGoal::BuildMuscle => {
            round_half_up(f64::from(tdee) + daily_adjustment)
        }
        PrimaryGoal::MaintainWeight | PrimaryGoal::BodyRecomposition => tdee,
    }
}

/// Daily macronutrient targets in grams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macros {
    pub protein_g: i32,
    pub carbs_g: i32,
    pub fat_g: i32,
    /// The protein and fat floors left no room for carbs; `carbs_g` was
    /// raised to zero and the targets need a human look.
    pub carbs_clamped: bool,
}

/// Protein grams per kg of body weight and fat share of calories.
fn macro_split(goal: PrimaryGoal) -> (f64, f64) {
    match goal {
        PrimaryGoal::BuildMuscle => (2.0, 0.25),
        PrimaryGoal::LoseWeight | PrimaryGoal::BodyRecomposition => (1.8, 0.25),
        PrimaryGoal::GainWeight => (1.6, 0.30),
        PrimaryGoal::MaintainWeight => (1.4, 0.30),
    }
}

/// Split a calorie target into protein, fat and carbs.
pub fn macros(calorie_target: i32, goal: PrimaryGoal, weight_kg: f64) -> Macros {
    let (protein_per_kg, fat_share) = macro_split(goal);
    let protein_g = round_half_up(weight_kg * protein_per_kg);
    let fat_g = round_half_up(f64::from(calorie_target) * fat_share / f64::from(KCAL_PER_G_FAT));
    let remaining = calorie_target - protein_g * KCAL_PER_G_PROTEIN - fat_g * KCAL_PER_G_FAT;
    let carbs = round_half_up(f64::from(remaining) / f64::from(KCAL_PER_G_CARBS));

    Macros {
        protein_g,
        carbs_g: carbs.max(0),
        fat_g,
        carbs_clamped: carbs < 0,
    }
}

// ---------------------------------------------------------------------------
// Full target computation
// ---------------------------------------------------------------------------

/// The profile attributes the targets depend on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyStats {
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub activity_level: ActivityLevel,
    pub primary_goal: PrimaryGoal,
    pub weekly_goal_kg: f64,
}

impl BodyStats {
    /// Collect the stats from a profile, or name the first missing field.
    pub fn from_profile(profile: &Profile) -> Result<Self, &'static str> {
        Ok(Self {
            date_of_birth: profile.date_of_birth.ok_or("date_of_birth")?,
            gender: profile.gender.ok_or("gender")?,
            height_cm: profile.height_cm.ok_or("height_cm")?,
            weight_kg: profile.current_weight_kg.ok_or("current_weight_kg")?,
            activity_level: profile.activity_level.ok_or("activity_level")?,
            primary_goal: profile.primary_goal.ok_or("primary_goal")?,
            weekly_goal_kg: profile.weekly_goal_kg.ok_or("weekly_goal_kg")?,
        })
    }
}

/// Result of running every formula for one person.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NutritionTargets {
    pub age: i32,
    pub bmr: f64,
    pub tdee: i32,
    pub daily_calories: i32,
    pub macros: Macros,
    pub formula: BmrFormula,
    /// The gender had no formula of its own and the configured fallback was
    /// used.
    pub gender_fallback: bool,
}

impl NutritionTargets {
    pub fn to_update(&self) -> TargetsUpdate {
        TargetsUpdate {
            daily_calories_target: self.daily_calories,
            daily_protein_g: self.macros.protein_g,
            daily_carbs_g: self.macros.carbs_g,
            daily_fat_g: self.macros.fat_g,
            targets_need_review: self.macros.carbs_clamped,
        }
    }
}

pub fn compute_targets(
    stats: &BodyStats,
    as_of: NaiveDate,
    unspecified_gender: BmrFormula,
) -> NutritionTargets {
    let age = age(stats.date_of_birth, as_of);
    let (formula, gender_fallback) = BmrFormula::for_gender(stats.gender, unspecified_gender);
    let bmr = bmr(stats.weight_kg, stats.height_cm, age, formula);
    let tdee = tdee(bmr, stats.activity_level);
    let daily_calories = calorie_target(tdee, stats.primary_goal, stats.weekly_goal_kg);
    let macros = macros(daily_calories, stats.primary_goal, stats.weight_kg);

    NutritionTargets {
        age,
        bmr,
        tdee,
        daily_calories,
        macros,
        formula,
        gender_fallback,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_before_and_on_birthday() {
        let dob = date(2000, 6, 15);
        assert_eq!(age(dob, date(2024, 6, 14)), 23);
        assert_eq!(age(dob, date(2024, 6, 15)), 24);
        assert_eq!(age(dob, date(2024, 12, 1)), 24);
        assert_eq!(age(dob, date(2024, 1, 20)), 23);
    }

    #[test]
    fn age_for_leap_day_birthday() {
        let dob = date(2004, 2, 29);
        assert_eq!(age(dob, date(2023, 2, 28)), 18);
        assert_eq!(age(dob, date(2023, 3, 1)), 19);
    }

    #[test]
    fn bmr_mifflin_st_jeor() {
        assert_eq!(bmr(70.0, 175.0, 30, BmrFormula::Male), 1648.75);
        assert_eq!(bmr(70.0, 175.0, 30, BmrFormula::Female), 1482.75);
    }

    #[test]
    fn tdee_rounds_scaled_bmr() {
        assert_eq!(tdee(1648.75, ActivityLevel::ModeratelyActive), 2556);
        assert_eq!(tdee(1500.0, ActivityLevel::Sedentary), 1800);
        assert_eq!(tdee(1000.0, ActivityLevel::ExtremelyActive), 1900);
    }

    #[test]
    fn unknown_activity_level_is_sedentary() {
        assert_eq!(parse_activity_level("couch_potato"), ActivityLevel::Sedentary);
        assert_eq!(parse_activity_level(" Very_Active "), ActivityLevel::VeryActive);
        assert_eq!(parse_primary_goal("get_shredded"), PrimaryGoal::MaintainWeight);
        assert_eq!(parse_primary_goal("lose_weight"), PrimaryGoal::LoseWeight);
    }

    #[test]
    fn calorie_target_applies_weekly_rate_for_weight_goals() {
        assert_eq!(calorie_target(2556, PrimaryGoal::LoseWeight, -0.5), 2006);
        assert_eq!(calorie_target(2556, PrimaryGoal::GainWeight, 0.25), 2831);
        assert_eq!(calorie_target(2556, PrimaryGoal::BuildMuscle, 0.25), 2831);
    }

    #[test]
    fn calorie_target_ignores_rate_for_maintenance_goals() {
        assert_eq!(calorie_target(2556, PrimaryGoal::MaintainWeight, -0.5), 2556);
        assert_eq!(calorie_target(2556, PrimaryGoal::BodyRecomposition, 1.0), 2556);
    }

    #[test]
    fn macros_for_weight_loss() {
        let m = macros(2006, PrimaryGoal::LoseWeight, 70.0);
        assert_eq!(
            m,
            Macros {
                protein_g: 126,
                carbs_g: 250,
                fat_g: 56,
                carbs_clamped: false,
            }
        );
    }

    #[test]
    fn macros_per_goal_split() {
        assert_eq!(macros(3000, PrimaryGoal::BuildMuscle, 80.0).protein_g, 160);
        assert_eq!(macros(3000, PrimaryGoal::BuildMuscle, 80.0).fat_g, 83);
        assert_eq!(macros(3000, PrimaryGoal::GainWeight, 80.0).protein_g, 128);
        assert_eq!(macros(3000, PrimaryGoal::GainWeight, 80.0).fat_g, 100);
        assert_eq!(macros(2000, PrimaryGoal::MaintainWeight, 50.0).protein_g, 70);
    }

    #[test]
    fn negative_carbs_are_clamped_and_flagged() {
        let m = macros(800, PrimaryGoal::BuildMuscle, 120.0);
        assert_eq!(m.protein_g, 240);
        assert_eq!(m.carbs_g, 0);
        assert!(m.carbs_clamped);
    }

    #[test]
    fn unspecified_gender_uses_configured_formula() {
        assert_eq!(
            BmrFormula::for_gender(Gender::Other, BmrFormula::Female),
            (BmrFormula::Female, true)
        );
        assert_eq!(
            BmrFormula::for_gender(Gender::PreferNotToSay, BmrFormula::Male),
            (BmrFormula::Male, true)
        );
        assert_eq!(
            BmrFormula::for_gender(Gender::Male, BmrFormula::Female),
            (BmrFormula::Male, false)
        );
        assert_eq!("male".parse::<BmrFormula>(), Ok(BmrFormula::Male));
        assert!("average".parse::<BmrFormula>().is_err());
    }

    #[test]
    fn compute_targets_end_to_end() {
        let stats = BodyStats {
            date_of_birth: date(1994, 1, 1),
            gender: Gender::Male,
            height_cm: 175.0,
            weight_kg: 70.0,
            activity_level: ActivityLevel::ModeratelyActive,
            primary_goal: PrimaryGoal::LoseWeight,
            weekly_goal_kg: -0.5,
        };
        let targets = compute_targets(&stats, date(2024, 6, 1), BmrFormula::Female);
        assert_eq!(targets.age, 30);
        assert_eq!(targets.bmr, 1648.75);
        assert_eq!(targets.tdee, 2556);
        assert_eq!(targets.daily_calories, 2006);
        assert!(!targets.gender_fallback);

        let update = targets.to_update();
        assert_eq!(update.daily_protein_g, 126);
        assert_eq!(update.daily_carbs_g, 250);
        assert_eq!(update.daily_fat_g, 56);
        assert!(!update.targets_need_review);

        // Same inputs, same bits.
        let again = compute_targets(&stats, date(2024, 6, 1), BmrFormula::Female);
        assert_eq!(targets.bmr.to_bits(), again.bmr.to_bits());
        assert_eq!(targets, again);
    }
}
