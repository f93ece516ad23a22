//! The generator's answer, as parsed but not yet validated.
//!
//! Field names follow the camelCase JSON the generator is asked to produce.
//! Parsing is forgiving: missing fields default, numbers may arrive as
//! strings, and odd values become `None` instead of failing the whole plan.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::generator::GenerationError;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidatePlan {
    #[serde(deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub description: Option<String>,
    pub days: Vec<CandidateDay>,
    pub shopping_list: Vec<CandidateShoppingCategory>,
    #[serde(deserialize_with = "lenient::number")]
    pub total_estimated_cost: Option<f64>,
}

impl CandidatePlan {
    /// Number of meals across all days, before validation.
    pub fn meal_count(&self) -> usize {
        self.days.iter().map(|d| d.meals.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateDay {
    /// 1-based day index within the plan.
    #[serde(deserialize_with = "lenient::number")]
    pub day: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub date: Option<String>,
    pub meals: Vec<CandidateMeal>,
    #[serde(deserialize_with = "lenient::number")]
    pub total_calories: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateMeal {
    #[serde(deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub meal_type: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub prep_time: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub cook_time: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub servings: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub difficulty: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub calories: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub protein: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub carbs: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub fat: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub fiber: Option<f64>,
    pub ingredients: Vec<CandidateIngredient>,
    #[serde(deserialize_with = "lenient::text_list")]
    pub instructions: Vec<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub cuisine: Option<String>,
    #[serde(deserialize_with = "lenient::text_list")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub estimated_cost: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateIngredient {
    #[serde(deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(deserialize_with = "lenient::number")]
    pub amount: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateShoppingCategory {
    #[serde(deserialize_with = "lenient::opt_text")]
    pub category: Option<String>,
    pub items: Vec<CandidateShoppingItem>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateShoppingItem {
    #[serde(deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(deserialize_with = "lenient::number")]
    pub amount: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub unit: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub estimated_cost: Option<f64>,
}

/// Parse a JSON document returned by the generator.
///
/// Tolerates surrounding whitespace and a Markdown code fence.
pub fn parse_generated_json<T: DeserializeOwned>(content: &str) -> Result<T, GenerationError> {
    let trimmed = strip_code_fence(content.trim());
    if trimmed.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    serde_json::from_str(trimmed).map_err(|e| GenerationError::Malformed(e.to_string()))
}

pub fn parse_candidate_plan(content: &str) -> Result<CandidatePlan, GenerationError> {
    parse_generated_json(content)
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // Drop an optional language tag on the opening fence.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

// ---------------------------------------------------------------------------
// Lenient field deserializers
// ---------------------------------------------------------------------------

pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use crate::generator::Confidence;

    fn value_to_number(value: &Value) -> Option<f64> {
        let n = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_start_matches('$').trim().parse().ok(),
            _ => None,
        }?;
        n.is_finite().then_some(n)
    }

    fn value_to_text(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// A number, a numeric string, or nothing.
    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(value.as_ref().and_then(value_to_number))
    }

    /// A string (or scalar rendered as one); anything else becomes `None`.
    pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(value.and_then(value_to_text))
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(opt_text(d)?.unwrap_or_default())
    }

    /// A list of strings. Also accepts a single string, and list entries
    /// shaped like `{"text": ...}` or `{"instruction": ...}`.
    pub fn text_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        let items = match value {
            Some(Value::Array(items)) => items,
            Some(Value::String(s)) => return Ok(vec![s]),
            _ => return Ok(Vec::new()),
        };
        Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(mut map) => map
                    .remove("text")
                    .or_else(|| map.remove("instruction"))
                    .and_then(value_to_text),
                other => value_to_text(other),
            })
            .collect())
    }

    /// `low` / `medium` / `high` in any case; anything else is `Low`.
    pub fn confidence<'de, D: Deserializer<'de>>(d: D) -> Result<Confidence, D::Error> {
        let text = opt_text(d)?.unwrap_or_default();
        Ok(match text.trim().to_ascii_lowercase().as_str() {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            _ => Confidence::Low,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
      "name": "Lean Week",
      "description": "High protein",
      "days": [
        {
          "day": 1,
          "date": "Day 1",
          "meals": [
            {
              "name": "Greek Yogurt Bowl",
              "mealType": "breakfast",
              "prepTime": 5,
              "cookTime": "0",
              "servings": 1,
              "difficulty": "easy",
              "calories": 350,
              "protein": 30,
              "carbs": 40,
              "fat": 8,
              "fiber": 5,
              "ingredients": [{"name": "Greek yogurt", "amount": 200, "unit": "g"}],
              "instructions": ["Spoon yogurt", "Top with berries"],
              "cuisine": "Greek",
              "tags": ["quick"],
              "estimatedCost": "$2.50"
            }
          ],
          "totalCalories": 350
        }
      ],
      "shoppingList": [
        {"category": "Dairy", "items": [{"name": "Greek yogurt", "amount": 1.4, "unit": "kg", "estimatedCost": 9}]}
      ],
      "totalEstimatedCost": 75.0
    }"#;

    #[test]
    fn parses_full_plan() {
        let plan = parse_candidate_plan(SAMPLE).unwrap();
        assert_eq!(plan.name, "Lean Week");
        assert_eq!(plan.meal_count(), 1);
        let meal = &plan.days[0].meals[0];
        assert_eq!(meal.meal_type.as_deref(), Some("breakfast"));
        assert_eq!(meal.cook_time, Some(0.0));
        assert_eq!(meal.estimated_cost, Some(2.5));
        assert_eq!(meal.instructions.len(), 2);
        assert_eq!(plan.shopping_list[0].items[0].amount, Some(1.4));
        assert_eq!(plan.total_estimated_cost, Some(75.0));
    }

    #[test]
    fn missing_and_odd_fields_default() {
        let plan = parse_candidate_plan(
            r#"{"days": [{"meals": [{"name": null, "calories": "lots", "tags": "spicy",
                "instructions": [{"step": 1, "text": "Chop"}, 7]}]}]}"#,
        )
        .unwrap();
        assert_eq!(plan.name, "");
        let day = &plan.days[0];
        assert_eq!(day.day, None);
        let meal = &day.meals[0];
        assert_eq!(meal.name, "");
        assert_eq!(meal.calories, None);
        assert_eq!(meal.tags, vec!["spicy".to_owned()]);
        assert_eq!(meal.instructions, vec!["Chop".to_owned(), "7".to_owned()]);
        assert!(plan.shopping_list.is_empty());
    }

    #[test]
    fn code_fences_are_stripped() {
        let fenced = format!("```json\n{SAMPLE}\n```");
        assert_eq!(parse_candidate_plan(&fenced).unwrap().name, "Lean Week");
    }

    #[test]
    fn empty_and_garbage_responses_fail() {
        assert!(matches!(
            parse_candidate_plan("   "),
            Err(GenerationError::EmptyResponse)
        ));
        assert!(matches!(
            parse_candidate_plan("Sorry, I can't help with that."),
            Err(GenerationError::Malformed(_))
        ));
        assert!(matches!(
            parse_candidate_plan(r#"{"days": "seven"}"#),
            Err(GenerationError::Malformed(_))
        ));
    }
}
