//! Read side of meal plans, recipes and shopping lists.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use nutriplan_db::models::{MealPlan, MealPlanItem, Recipe, ShoppingList, ShoppingListItem};
use nutriplan_db::queries::{meal_plan_items, meal_plans, recipes, shopping_lists};

use crate::auth::Identity;
use crate::error::{ServiceError, ServiceResult};

/// A plan item together with its recipe, when the recipe still exists.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedMeal {
    #[serde(flatten)]
    pub item: MealPlanItem,
    pub recipe: Option<Recipe>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealPlanDetail {
    pub plan: MealPlan,
    /// Ordered by date, then by position within the day.
    pub meals: Vec<PlannedMeal>,
    pub shopping_list_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivePlan {
    pub plan: MealPlan,
    pub today: Vec<PlannedMeal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShoppingCategory {
    pub category: String,
    pub items: Vec<ShoppingListItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShoppingListDetail {
    pub list: ShoppingList,
    pub categories: Vec<ShoppingCategory>,
    pub purchased: usize,
    pub total: usize,
}

pub async fn list_meal_plans(pool: &PgPool, identity: Identity) -> ServiceResult<Vec<MealPlan>> {
    let user_id = identity.require()?;
    Ok(meal_plans::list_meal_plans(pool, user_id).await?)
}

pub async fn get_meal_plan_detail(
    pool: &PgPool,
    identity: Identity,
    plan_id: Uuid,
) -> ServiceResult<MealPlanDetail> {
    let user_id = identity.require()?;
    let plan = meal_plans::get_meal_plan(pool, user_id, plan_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("meal plan"))?;

    let items = meal_plan_items::list_items_for_plan(pool, plan.id).await?;
    let meals = attach_recipes(pool, items).await?;
    let shopping_list_id = shopping_lists::get_shopping_list_for_plan(pool, user_id, plan.id)
        .await?
        .map(|l| l.id);

    Ok(MealPlanDetail {
        plan,
        meals,
        shopping_list_id,
    })
}

/// The newest active plan and the meals scheduled for `today`.
pub async fn get_active_plan(
    pool: &PgPool,
    identity: Identity,
    today: NaiveDate,
) -> ServiceResult<Option<ActivePlan>> {
    let user_id = identity.require()?;
    let Some(plan) = meal_plans::get_active_meal_plan(pool, user_id).await? else {
        return Ok(None);
    };

    let items = meal_plan_items::list_items_for_date(pool, plan.id, today).await?;
    let today = attach_recipes(pool, items).await?;
    Ok(Some(ActivePlan { plan, today }))
}

async fn attach_recipes(
    pool: &PgPool,
    items: Vec<MealPlanItem>,
) -> ServiceResult<Vec<PlannedMeal>> {
    let ids: Vec<Uuid> = items.iter().filter_map(|i| i.recipe_id).collect();
    let by_id: HashMap<Uuid, Recipe> = recipes::get_recipes_by_ids(pool, &ids)
        .await?
        .into_iter()
        .map(|r| (r.id, r))
        .collect();

    Ok(items
        .into_iter()
        .map(|item| {
            let recipe = item.recipe_id.and_then(|id| by_id.get(&id).cloned());
            PlannedMeal { item, recipe }
        })
        .collect())
}

pub async fn list_recipes(pool: &PgPool, identity: Identity) -> ServiceResult<Vec<Recipe>> {
    let user_id = identity.require()?;
    Ok(recipes::list_recipes_by_creator(pool, user_id).await?)
}

/// Recipes are public by ID.
pub async fn get_recipe(pool: &PgPool, recipe_id: Uuid) -> ServiceResult<Recipe> {
    recipes::get_recipe(pool, recipe_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("recipe"))
}

pub async fn list_shopping_lists(
    pool: &PgPool,
    identity: Identity,
) -> ServiceResult<Vec<ShoppingList>> {
    let user_id = identity.require()?;
    Ok(shopping_lists::list_shopping_lists(pool, user_id).await?)
}

pub async fn get_shopping_list_detail(
    pool: &PgPool,
    identity: Identity,
    list_id: Uuid,
) -> ServiceResult<ShoppingListDetail> {
    let user_id = identity.require()?;
    let list = shopping_lists::get_shopping_list(pool, user_id, list_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("shopping list"))?;

    let items = shopping_lists::list_items_for_list(pool, list.id).await?;
    let total = items.len();
    let purchased = items.iter().filter(|i| i.is_purchased).count();

    Ok(ShoppingListDetail {
        list,
        categories: group_by_category(items),
        purchased,
        total,
    })
}

/// Group items that arrive sorted by category, keeping that order.
pub fn group_by_category(items: Vec<ShoppingListItem>) -> Vec<ShoppingCategory> {
    let mut groups: Vec<ShoppingCategory> = Vec::new();
    for item in items {
        match groups.last_mut() {
            Some(group) if group.category == item.category => group.items.push(item),
            _ => groups.push(ShoppingCategory {
                category: item.category.clone(),
                items: vec![item],
            }),
        }
    }
    groups
}
