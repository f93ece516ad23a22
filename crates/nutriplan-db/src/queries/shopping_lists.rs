//! Database query functions for the `shopping_lists` and
//! `shopping_list_items` tables.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ShoppingList, ShoppingListItem};

#[derive(Debug, Clone, PartialEq)]
pub struct NewShoppingList {
    pub user_id: Uuid,
    pub meal_plan_id: Option<Uuid>,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub estimated_total_cost: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewShoppingListItem {
    pub shopping_list_id: Uuid,
    pub ingredient_name: String,
    pub quantity: f64,
    pub unit: String,
    pub category: String,
    pub estimated_cost: Option<f64>,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

/// Insert a shopping list.
pub async fn insert_shopping_list(pool: &PgPool, list: &NewShoppingList) -> Result<ShoppingList> {
    let row = sqlx::query_as::<_, ShoppingList>(
        "INSERT INTO shopping_lists \
            (user_id, meal_plan_id, name, start_date, end_date, estimated_total_cost) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(list.user_id)
    .bind(list.meal_plan_id)
    .bind(&list.name)
    .bind(list.start_date)
    .bind(list.end_date)
    .bind(list.estimated_total_cost)
    .fetch_one(pool)
    .await
    .context("failed to insert shopping list")?;

    Ok(row)
}

/// List a user's shopping lists, newest first.
pub async fn list_shopping_lists(pool: &PgPool, user_id: Uuid) -> Result<Vec<ShoppingList>> {
    let lists = sqlx::query_as::<_, ShoppingList>(
        "SELECT * FROM shopping_lists WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to list shopping lists")?;

    Ok(lists)
}

/// Fetch one of the user's shopping lists.
pub async fn get_shopping_list(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<Option<ShoppingList>> {
    let list = sqlx::query_as::<_, ShoppingList>(
        "SELECT * FROM shopping_lists WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch shopping list")?;

    Ok(list)
}

/// Fetch the shopping list generated alongside a meal plan.
pub async fn get_shopping_list_for_plan(
    pool: &PgPool,
    user_id: Uuid,
    meal_plan_id: Uuid,
) -> Result<Option<ShoppingList>> {
    let list = sqlx::query_as::<_, ShoppingList>(
        "SELECT * FROM shopping_lists \
         WHERE meal_plan_id = $1 AND user_id = $2 \
         ORDER BY created_at DESC \
         LIMIT 1",
    )
    .bind(meal_plan_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch shopping list for meal plan")?;

    Ok(list)
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Insert a shopping list item.
pub async fn insert_shopping_list_item(
    pool: &PgPool,
    item: &NewShoppingListItem,
) -> Result<ShoppingListItem> {
    let row = sqlx::query_as::<_, ShoppingListItem>(
        "INSERT INTO shopping_list_items \
            (shopping_list_id, ingredient_name, quantity, unit, category, estimated_cost, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING *",
    )
    .bind(item.shopping_list_id)
    .bind(&item.ingredient_name)
    .bind(item.quantity)
    .bind(&item.unit)
    .bind(&item.category)
    .bind(item.estimated_cost)
    .bind(item.notes.as_deref())
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert shopping item {:?}", item.ingredient_name))?;

    Ok(row)
}

/// List a shopping list's items grouped by aisle.
pub async fn list_items_for_list(
    pool: &PgPool,
    shopping_list_id: Uuid,
) -> Result<Vec<ShoppingListItem>> {
    let items = sqlx::query_as::<_, ShoppingListItem>(
        "SELECT * FROM shopping_list_items \
         WHERE shopping_list_id = $1 \
         ORDER BY category, ingredient_name",
    )
    .bind(shopping_list_id)
    .fetch_all(pool)
    .await
    .context("failed to list shopping list items")?;

    Ok(items)
}

/// Fetch an item if it belongs to one of the user's lists.
pub async fn get_item_for_user(
    pool: &PgPool,
    user_id: Uuid,
    item_id: Uuid,
) -> Result<Option<ShoppingListItem>> {
    let item = sqlx::query_as::<_, ShoppingListItem>(
        "SELECT i.* FROM shopping_list_items i \
         JOIN shopping_lists l ON l.id = i.shopping_list_id \
         WHERE i.id = $1 AND l.user_id = $2",
    )
    .bind(item_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch shopping list item")?;

    Ok(item)
}

/// Set the purchased flag, but only if it still holds `expected`.
///
/// Returns `None` when the item is missing, not owned by the user, or was
/// changed concurrently.
pub async fn set_item_purchased(
    pool: &PgPool,
    user_id: Uuid,
    item_id: Uuid,
    expected: bool,
    purchased: bool,
) -> Result<Option<ShoppingListItem>> {
    let item = sqlx::query_as::<_, ShoppingListItem>(
        "UPDATE shopping_list_items i \
         SET is_purchased = $4, \
             purchased_at = CASE WHEN $4 THEN now() ELSE NULL END \
         FROM shopping_lists l \
         WHERE i.id = $2 AND i.shopping_list_id = l.id AND l.user_id = $1 \
           AND i.is_purchased = $3 \
         RETURNING i.*",
    )
    .bind(user_id)
    .bind(item_id)
    .bind(expected)
    .bind(purchased)
    .fetch_optional(pool)
    .await
    .context("failed to update shopping list item")?;

    Ok(item)
}
