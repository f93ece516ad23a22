//! Integration tests for meal plans, recipes, plan items and shopping lists.

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use nutriplan_db::models::{MealType, RecipeIngredient, RecipeStep};
use nutriplan_db::queries::meal_plan_items::{self, NewMealPlanItem};
use nutriplan_db::queries::meal_plans::{self, NewMealPlan};
use nutriplan_db::queries::recipes::{self, NewRecipe};
use nutriplan_db::queries::shopping_lists::{self, NewShoppingList, NewShoppingListItem};
use nutriplan_test_utils::{TestDb, create_test_profile};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

async fn insert_plan(pool: &PgPool, user_id: Uuid, name: &str) -> Uuid {
    let plan = NewMealPlan {
        user_id,
        name: name.to_owned(),
        description: None,
        start_date: day(1),
        end_date: day(3),
        total_days: 3,
        avg_daily_calories: Some(2000),
        avg_daily_protein_g: Some(150),
        avg_daily_carbs_g: Some(200),
        avg_daily_fat_g: Some(70),
        estimated_total_cost: Some(80.0),
        generation_prompt: Some(serde_json::json!({ "number_of_days": 3 })),
    };
    meal_plans::insert_meal_plan(pool, &plan).await.unwrap().id
}

fn new_recipe(name: &str, created_by: Uuid) -> NewRecipe {
    NewRecipe {
        name: name.to_owned(),
        description: Some("tasty".to_owned()),
        prep_time_minutes: Some(5),
        cook_time_minutes: Some(10),
        servings: 4,
        difficulty: None,
        calories: Some(450),
        protein_g: Some(30.0),
        carbs_g: Some(40.0),
        fat_g: Some(15.0),
        fiber_g: Some(6.0),
        ingredients: vec![RecipeIngredient {
            name: "rice".to_owned(),
            amount: 200.0,
            unit: "g".to_owned(),
        }],
        instructions: vec![RecipeStep {
            step: 1,
            text: "Cook the rice".to_owned(),
        }],
        cuisine: Some("Japanese".to_owned()),
        meal_type: Some(MealType::Lunch),
        tags: vec!["quick".to_owned()],
        estimated_cost: Some(12.0),
        cost_per_serving: Some(3.0),
        is_ai_generated: true,
        created_by: Some(created_by),
    }
}

#[tokio::test]
async fn deactivate_other_plans_keeps_only_the_new_one() {
    let db = TestDb::new().await;
    let profile = create_test_profile(&db.pool).await;
    let other = create_test_profile(&db.pool).await;

    let first = insert_plan(&db.pool, profile.id, "first").await;
    let foreign = insert_plan(&db.pool, other.id, "foreign").await;
    let second = insert_plan(&db.pool, profile.id, "second").await;
    assert_eq!(meal_plans::count_active_plans(&db.pool, profile.id).await.unwrap(), 2);

    let switched = meal_plans::deactivate_other_plans(&db.pool, profile.id, second)
        .await
        .unwrap();
    assert_eq!(switched, 1);

    let active = meal_plans::get_active_meal_plan(&db.pool, profile.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.id, second);
    let old = meal_plans::get_meal_plan(&db.pool, profile.id, first)
        .await
        .unwrap()
        .unwrap();
    assert!(!old.is_active);

    // Other users are untouched and invisible.
    assert_eq!(meal_plans::count_active_plans(&db.pool, other.id).await.unwrap(), 1);
    assert!(meal_plans::get_meal_plan(&db.pool, profile.id, foreign)
        .await
        .unwrap()
        .is_none());

    db.teardown().await;
}

#[tokio::test]
async fn recipe_roundtrips_structured_columns() {
    let db = TestDb::new().await;
    let profile = create_test_profile(&db.pool).await;

    let stored = recipes::insert_recipe(&db.pool, &new_recipe("Rice bowl", profile.id))
        .await
        .unwrap();
    assert_eq!(stored.total_time_minutes, Some(15));
    assert_eq!(stored.ingredients.0[0].name, "rice");
    assert_eq!(stored.instructions.0[0].step, 1);
    assert_eq!(stored.cost_per_serving, Some(3.0));

    let fetched = recipes::get_recipe(&db.pool, stored.id).await.unwrap().unwrap();
    assert_eq!(fetched.name, "Rice bowl");

    let listed = recipes::list_recipes_by_creator(&db.pool, profile.id).await.unwrap();
    assert_eq!(listed.len(), 1);

    let by_ids = recipes::get_recipes_by_ids(&db.pool, &[stored.id, Uuid::new_v4()])
        .await
        .unwrap();
    assert_eq!(by_ids.len(), 1);
    assert!(recipes::get_recipes_by_ids(&db.pool, &[]).await.unwrap().is_empty());

    db.teardown().await;
}

#[tokio::test]
async fn plan_items_are_ordered_and_toggle_with_compare_and_swap() {
    let db = TestDb::new().await;
    let profile = create_test_profile(&db.pool).await;
    let stranger = create_test_profile(&db.pool).await;
    let plan_id = insert_plan(&db.pool, profile.id, "plan").await;

    for (date, order, meal_type) in [
        (day(2), 0, MealType::Breakfast),
        (day(1), 1, MealType::Dinner),
        (day(1), 0, MealType::Breakfast),
    ] {
        let item = NewMealPlanItem {
            meal_plan_id: plan_id,
            recipe_id: None,
            plan_date: date,
            meal_type,
            meal_order: order,
            servings: 1,
            recipe_name: Some(format!("{meal_type} on {date}")),
            calories: Some(500),
        };
        meal_plan_items::insert_meal_plan_item(&db.pool, &item).await.unwrap();
    }

    let items = meal_plan_items::list_items_for_plan(&db.pool, plan_id).await.unwrap();
    let order: Vec<(NaiveDate, i32)> = items.iter().map(|i| (i.plan_date, i.meal_order)).collect();
    assert_eq!(order, vec![(day(1), 0), (day(1), 1), (day(2), 0)]);

    let today = meal_plan_items::list_items_for_date(&db.pool, plan_id, day(1))
        .await
        .unwrap();
    assert_eq!(today.len(), 2);

    let target = items[0].id;
    let done = meal_plan_items::set_item_completed(&db.pool, profile.id, target, false, true)
        .await
        .unwrap()
        .expect("first toggle applies");
    assert!(done.is_completed);
    assert!(done.completed_at.is_some());

    // A stale expectation loses the race.
    let stale = meal_plan_items::set_item_completed(&db.pool, profile.id, target, false, true)
        .await
        .unwrap();
    assert!(stale.is_none());

    // Another user cannot touch it.
    let foreign = meal_plan_items::set_item_completed(&db.pool, stranger.id, target, true, false)
        .await
        .unwrap();
    assert!(foreign.is_none());
    assert!(meal_plan_items::get_item_for_user(&db.pool, stranger.id, target)
        .await
        .unwrap()
        .is_none());

    let undone = meal_plan_items::set_item_completed(&db.pool, profile.id, target, true, false)
        .await
        .unwrap()
        .unwrap();
    assert!(!undone.is_completed);
    assert!(undone.completed_at.is_none());

    db.teardown().await;
}

#[tokio::test]
async fn shopping_list_items_group_by_category() {
    let db = TestDb::new().await;
    let profile = create_test_profile(&db.pool).await;
    let plan_id = insert_plan(&db.pool, profile.id, "plan").await;

    let list = shopping_lists::insert_shopping_list(
        &db.pool,
        &NewShoppingList {
            user_id: profile.id,
            meal_plan_id: Some(plan_id),
            name: "Shopping List - plan".to_owned(),
            start_date: Some(day(1)),
            end_date: Some(day(3)),
            estimated_total_cost: Some(42.5),
        },
    )
    .await
    .unwrap();

    for (name, category) in [("Spinach", "Produce"), ("Milk", "Dairy"), ("Apples", "Produce")] {
        let item = NewShoppingListItem {
            shopping_list_id: list.id,
            ingredient_name: name.to_owned(),
            quantity: 1.0,
            unit: "pcs".to_owned(),
            category: category.to_owned(),
            estimated_cost: Some(2.0),
            notes: None,
        };
        shopping_lists::insert_shopping_list_item(&db.pool, &item).await.unwrap();
    }

    let items = shopping_lists::list_items_for_list(&db.pool, list.id).await.unwrap();
    let names: Vec<&str> = items.iter().map(|i| i.ingredient_name.as_str()).collect();
    assert_eq!(names, vec!["Milk", "Apples", "Spinach"]);

    let by_plan = shopping_lists::get_shopping_list_for_plan(&db.pool, profile.id, plan_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_plan.id, list.id);

    let bought = shopping_lists::set_item_purchased(&db.pool, profile.id, items[0].id, false, true)
        .await
        .unwrap()
        .unwrap();
    assert!(bought.is_purchased);
    assert!(bought.purchased_at.is_some());

    db.teardown().await;
}
