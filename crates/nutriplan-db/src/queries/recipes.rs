//! Database query functions for the `recipes` table.
//!
//! Recipes are readable by anyone who knows the ID; listing is scoped to the
//! creating user.

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{Difficulty, MealType, Recipe, RecipeIngredient, RecipeStep};

/// A recipe ready to insert. Nutrition is per serving.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipe {
    pub name: String,
    pub description: Option<String>,
    pub prep_time_minutes: Option<i32>,
    pub cook_time_minutes: Option<i32>,
    pub servings: i32,
    pub difficulty: Option<Difficulty>,
    pub calories: Option<i32>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub fiber_g: Option<f64>,
    pub ingredients: Vec<RecipeIngredient>,
    pub instructions: Vec<RecipeStep>,
    pub cuisine: Option<String>,
    pub meal_type: Option<MealType>,
    pub tags: Vec<String>,
    pub estimated_cost: Option<f64>,
    pub cost_per_serving: Option<f64>,
    pub is_ai_generated: bool,
    pub created_by: Option<Uuid>,
}

impl NewRecipe {
    /// Prep plus cook time, when at least one is known.
    pub fn total_time_minutes(&self) -> Option<i32> {
        match (self.prep_time_minutes, self.cook_time_minutes) {
            (None, None) => None,
            (prep, cook) => Some(prep.unwrap_or(0) + cook.unwrap_or(0)),
        }
    }
}

/// Insert a recipe and return the stored row.
pub async fn insert_recipe(pool: &PgPool, recipe: &NewRecipe) -> Result<Recipe> {
    let row = sqlx::query_as::<_, Recipe>(
        "INSERT INTO recipes \
            (name, description, prep_time_minutes, cook_time_minutes, total_time_minutes, \
             servings, difficulty, calories, protein_g, carbs_g, fat_g, fiber_g, \
             ingredients, instructions, cuisine, meal_type, tags, \
             estimated_cost, cost_per_serving, is_ai_generated, created_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
                 $16, $17, $18, $19, $20, $21) \
         RETURNING *",
    )
    .bind(&recipe.name)
    .bind(recipe.description.as_deref())
    .bind(recipe.prep_time_minutes)
    .bind(recipe.cook_time_minutes)
    .bind(recipe.total_time_minutes())
    .bind(recipe.servings)
    .bind(recipe.difficulty)
    .bind(recipe.calories)
    .bind(recipe.protein_g)
    .bind(recipe.carbs_g)
    .bind(recipe.fat_g)
    .bind(recipe.fiber_g)
    .bind(Json(&recipe.ingredients))
    .bind(Json(&recipe.instructions))
    .bind(recipe.cuisine.as_deref())
    .bind(recipe.meal_type)
    .bind(&recipe.tags)
    .bind(recipe.estimated_cost)
    .bind(recipe.cost_per_serving)
    .bind(recipe.is_ai_generated)
    .bind(recipe.created_by)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert recipe {:?}", recipe.name))?;

    Ok(row)
}

/// Fetch a recipe by ID.
pub async fn get_recipe(pool: &PgPool, id: Uuid) -> Result<Option<Recipe>> {
    let recipe = sqlx::query_as::<_, Recipe>("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch recipe")?;

    Ok(recipe)
}

/// Fetch several recipes at once. Missing IDs are silently absent.
pub async fn get_recipes_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Recipe>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let recipes = sqlx::query_as::<_, Recipe>("SELECT * FROM recipes WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .context("failed to fetch recipes")?;

    Ok(recipes)
}

/// List the recipes a user has generated, newest first.
pub async fn list_recipes_by_creator(pool: &PgPool, user_id: Uuid) -> Result<Vec<Recipe>> {
    let recipes = sqlx::query_as::<_, Recipe>(
        "SELECT * FROM recipes WHERE created_by = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to list recipes")?;

    Ok(recipes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(prep: Option<i32>, cook: Option<i32>) -> NewRecipe {
        NewRecipe {
            name: "Oats".to_owned(),
            description: None,
            prep_time_minutes: prep,
            cook_time_minutes: cook,
            servings: 1,
            difficulty: None,
            calories: None,
            protein_g: None,
            carbs_g: None,
            fat_g: None,
            fiber_g: None,
            ingredients: Vec::new(),
            instructions: Vec::new(),
            cuisine: None,
            meal_type: None,
            tags: Vec::new(),
            estimated_cost: None,
            cost_per_serving: None,
            is_ai_generated: true,
            created_by: None,
        }
    }

    #[test]
    fn total_time_sums_known_parts() {
        assert_eq!(recipe(Some(10), Some(15)).total_time_minutes(), Some(25));
        assert_eq!(recipe(Some(10), None).total_time_minutes(), Some(10));
        assert_eq!(recipe(None, None).total_time_minutes(), None);
    }
}
