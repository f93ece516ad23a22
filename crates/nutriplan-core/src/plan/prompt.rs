//! Prompt text sent to the generator.

use std::fmt::Write;

use super::request::GenerationRequest;

pub const PLAN_SYSTEM_PROMPT: &str = "\
You are a professional nutritionist and chef. Generate detailed, practical meal plans with accurate nutritional information.

Always respond with valid JSON matching the exact schema provided. Be precise with measurements and nutritional values.
Consider the user's dietary restrictions, allergies, and preferences carefully.
Make recipes realistic and achievable for home cooks.";

pub const PHOTO_SYSTEM_PROMPT: &str = "\
You are a nutrition expert. Analyze food photos and estimate nutritional content.
Always respond with valid JSON. Be conservative with estimates and indicate confidence level.";

pub const PHOTO_USER_PROMPT: &str = r#"Analyze this food photo and provide nutritional estimates. Return JSON:
{
  "foodName": "Name of the dish/food",
  "description": "Brief description of what you see",
  "estimatedCalories": 500,
  "estimatedProtein": 30,
  "estimatedCarbs": 50,
  "estimatedFat": 20,
  "confidence": "low|medium|high",
  "suggestions": ["Any health tips or observations"]
}"#;

fn meal_slots(meals_per_day: u32) -> &'static str {
    if meals_per_day >= 4 {
        "breakfast, lunch, dinner, snack"
    } else {
        "breakfast, lunch, dinner"
    }
}

/// Build the user prompt for a meal plan request.
pub fn build_plan_prompt(req: &GenerationRequest) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Generate a {}-day meal plan with the following requirements:\n",
        req.number_of_days
    );

    out.push_str("## NUTRITION TARGETS (per day)\n");
    let _ = writeln!(out, "- Calories: {} kcal", req.daily_calories);
    let _ = writeln!(out, "- Protein: {}g", req.daily_protein_g);
    let _ = writeln!(out, "- Carbs: {}g", req.daily_carbs_g);
    let _ = writeln!(out, "- Fat: {}g\n", req.daily_fat_g);

    out.push_str("## DIETARY REQUIREMENTS\n");
    let _ = writeln!(out, "- Diet type: {}", req.diet_type);
    if req.allergies.is_empty() {
        out.push_str("- No allergies\n");
    } else {
        let _ = writeln!(out, "- ALLERGIES (MUST AVOID): {}", req.allergies.join(", "));
    }
    if !req.disliked_foods.is_empty() {
        let _ = writeln!(out, "- Foods to avoid: {}", req.disliked_foods.join(", "));
    }
    if req.favorite_cuisines.is_empty() {
        out.push_str("- Any cuisine\n");
    } else {
        let _ = writeln!(
            out,
            "- Preferred cuisines: {}",
            req.favorite_cuisines.join(", ")
        );
    }
    out.push('\n');

    out.push_str("## PREFERENCES\n");
    let _ = writeln!(out, "- Cooking skill: {}", req.cooking_skill);
    let _ = writeln!(
        out,
        "- Max prep + cook time: {} minutes",
        req.max_prep_time_minutes
    );
    let _ = writeln!(out, "- Budget: {}", req.budget_level);
    let _ = writeln!(out, "- Servings per meal: {}", req.servings_per_meal);
    let _ = writeln!(
        out,
        "- Meals per day: {} ({})\n",
        req.meals_per_day,
        meal_slots(req.meals_per_day)
    );

    out.push_str("## OUTPUT FORMAT\nReturn a JSON object with this exact structure:\n");
    out.push_str(&output_schema(req.servings_per_meal));

    out.push_str(
        "\n\nIMPORTANT:\n\
         - Number days from 1 to the requested number of days\n\
         - Ensure daily totals are close to the nutrition targets (within 10%)\n\
         - Combine shopping list items across all days (aggregate quantities)\n\
         - Use practical measurements (cups, tbsp, pieces, grams)\n\
         - Prices should be in USD\n\
         - Make recipes varied and interesting\n\
         - Consider meal prep efficiency (ingredients used across multiple meals)",
    );

    out
}

fn output_schema(servings: i32) -> String {
    format!(
        r#"{{
  "name": "Meal Plan Name",
  "description": "Brief description of the meal plan",
  "days": [
    {{
      "day": 1,
      "date": "Day 1",
      "meals": [
        {{
          "name": "Meal name",
          "description": "Brief description",
          "mealType": "breakfast|lunch|dinner|snack",
          "prepTime": 10,
          "cookTime": 15,
          "servings": {servings},
          "difficulty": "easy|medium|hard",
          "calories": 400,
          "protein": 25,
          "carbs": 40,
          "fat": 15,
          "fiber": 5,
          "ingredients": [
            {{"name": "ingredient", "amount": 100, "unit": "g"}}
          ],
          "instructions": ["Step 1", "Step 2"],
          "cuisine": "Italian",
          "tags": ["high-protein", "quick"],
          "estimatedCost": 5.50
        }}
      ],
      "totalCalories": 2000
    }}
  ],
  "shoppingList": [
    {{
      "category": "Produce",
      "items": [
        {{"name": "Spinach", "amount": 200, "unit": "g", "estimatedCost": 3.00}}
      ]
    }}
  ],
  "totalEstimatedCost": 75.00
}}"#
    )
}

#[cfg(test)]
mod tests {
    use nutriplan_db::models::{BudgetLevel, CookingSkill, DietType};

    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            daily_calories: 2006,
            daily_protein_g: 126,
            daily_carbs_g: 250,
            daily_fat_g: 56,
            diet_type: DietType::Vegetarian,
            allergies: vec!["peanuts".to_owned(), "sesame".to_owned()],
            disliked_foods: Vec::new(),
            favorite_cuisines: vec!["Thai".to_owned()],
            cooking_skill: CookingSkill::Beginner,
            max_prep_time_minutes: 30,
            budget_level: BudgetLevel::Budget,
            servings_per_meal: 2,
            number_of_days: 5,
            meals_per_day: 4,
        }
    }

    #[test]
    fn prompt_carries_targets_and_constraints() {
        let prompt = build_plan_prompt(&request());
        assert!(prompt.starts_with("Generate a 5-day meal plan"));
        assert!(prompt.contains("- Calories: 2006 kcal"));
        assert!(prompt.contains("- Diet type: vegetarian"));
        assert!(prompt.contains("ALLERGIES (MUST AVOID): peanuts, sesame"));
        assert!(prompt.contains("- Preferred cuisines: Thai"));
        assert!(prompt.contains("- Cooking skill: beginner"));
        assert!(prompt.contains("- Meals per day: 4 (breakfast, lunch, dinner, snack)"));
        assert!(prompt.contains(r#""servings": 2,"#));
        assert!(!prompt.contains("Foods to avoid"));
    }

    #[test]
    fn prompt_without_lists_uses_fallback_lines() {
        let mut req = request();
        req.allergies.clear();
        req.favorite_cuisines.clear();
        req.meals_per_day = 3;
        let prompt = build_plan_prompt(&req);
        assert!(prompt.contains("- No allergies"));
        assert!(prompt.contains("- Any cuisine"));
        assert!(prompt.contains("- Meals per day: 3 (breakfast, lunch, dinner)"));
    }

    #[test]
    fn schema_example_is_valid_json() {
        let schema = output_schema(1);
        let value: serde_json::Value = serde_json::from_str(&schema).unwrap();
        assert_eq!(value["days"][0]["meals"][0]["servings"], 1);
    }
}
