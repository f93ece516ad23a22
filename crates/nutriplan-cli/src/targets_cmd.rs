//! `nutriplan targets`: the nutrition calculator without a database.

use anyhow::{Result, bail};
use chrono::{NaiveDate, Utc};

use nutriplan_core::nutrition::{self, BmrFormula, BodyStats, NutritionTargets};
use nutriplan_core::onboarding::{AGE_YEARS, HEIGHT_CM, WEEKLY_GOAL_KG, WEIGHT_KG};

fn check_range<T: PartialOrd + std::fmt::Display>(
    field: &str,
    value: T,
    range: std::ops::RangeInclusive<T>,
) -> Result<()> {
    if !range.contains(&value) {
        bail!(
            "{field} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        );
    }
    Ok(())
}

/// Validate the inputs and compute targets as of `today`.
pub fn compute(
    stats: &BodyStats,
    today: NaiveDate,
    unspecified_gender: BmrFormula,
) -> Result<NutritionTargets> {
    check_range("height_cm", stats.height_cm, HEIGHT_CM)?;
    check_range("weight_kg", stats.weight_kg, WEIGHT_KG)?;
    check_range("weekly_goal_kg", stats.weekly_goal_kg, WEEKLY_GOAL_KG)?;
    check_range("age", nutrition::age(stats.date_of_birth, today), AGE_YEARS)?;
    Ok(nutrition::compute_targets(stats, today, unspecified_gender))
}

pub fn render(targets: &NutritionTargets) -> String {
    let mut out = String::new();
    out.push_str(&format!("  Age:        {}\n", targets.age));
    out.push_str(&format!("  BMR:        {:.0} kcal\n", targets.bmr));
    out.push_str(&format!("  TDEE:       {} kcal\n", targets.tdee));
    out.push_str(&format!("  Calories:   {} kcal/day\n", targets.daily_calories));
    out.push_str(&format!("  Protein:    {} g\n", targets.macros.protein_g));
    out.push_str(&format!("  Carbs:      {} g\n", targets.macros.carbs_g));
    out.push_str(&format!("  Fat:        {} g\n", targets.macros.fat_g));
    if targets.gender_fallback {
        out.push_str(&format!(
            "  Note:       no formula for this gender; used {:?}\n",
            targets.formula
        ));
    }
    if targets.macros.carbs_clamped {
        out.push_str("  Note:       carbohydrates clamped to 0 g; review these targets\n");
    }
    out
}

pub fn run_targets(stats: &BodyStats, unspecified_gender: BmrFormula, json: bool) -> Result<()> {
    let targets = compute(stats, Utc::now().date_naive(), unspecified_gender)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&targets)?);
    } else {
        println!("Nutrition targets:");
        print!("{}", render(&targets));
    }
    Ok(())
}
