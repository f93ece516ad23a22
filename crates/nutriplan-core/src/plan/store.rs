//! Storage seam for plan persistence.
//!
//! The orchestrator only needs a handful of writes, each returning the new
//! row's ID. Keeping them behind a trait lets tests inject failures at any
//! step without a database.
//!
//! Activating a plan takes a Postgres advisory lock keyed on the user, so
//! the one-active-plan rule holds across server replicas and CLI runs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Connection, PgConnection, PgPool};
use uuid::Uuid;

use nutriplan_db::models::Profile;
use nutriplan_db::queries::meal_plan_items::{self, NewMealPlanItem};
use nutriplan_db::queries::meal_plans::{self, NewMealPlan};
use nutriplan_db::queries::recipes::{self, NewRecipe};
use nutriplan_db::queries::shopping_lists::{self, NewShoppingList, NewShoppingListItem};
use nutriplan_db::queries::profiles;

/// Result of [`PlanStore::activate_new_plan`].
#[derive(Debug)]
pub struct PlanActivation {
    pub plan_id: Uuid,
    /// How many older plans were switched off, or why that failed. The new
    /// plan is kept either way.
    pub deactivated: Result<u64>,
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn load_profile(&self, user_id: Uuid) -> Result<Option<Profile>>;

    /// Insert `plan` as active and switch off the user's other plans.
    ///
    /// Must be atomic per user against every other caller of the same
    /// storage, not just this process. `Err` means the plan was not saved.
    async fn activate_new_plan(&self, plan: &NewMealPlan) -> Result<PlanActivation>;

    async fn insert_recipe(&self, recipe: &NewRecipe) -> Result<Uuid>;

    async fn insert_meal_plan_item(&self, item: &NewMealPlanItem) -> Result<Uuid>;

    async fn insert_shopping_list(&self, list: &NewShoppingList) -> Result<Uuid>;

    async fn insert_shopping_list_item(&self, item: &NewShoppingListItem) -> Result<Uuid>;
}

// Compile-time assertion: PlanStore must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn PlanStore) {}
};

/// [`PlanStore`] backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgPlanStore {
    pool: PgPool,
}

impl PgPlanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanStore for PgPlanStore {
    async fn load_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        profiles::get_profile(&self.pool, user_id).await
    }

    async fn activate_new_plan(&self, plan: &NewMealPlan) -> Result<PlanActivation> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin meal plan transaction")?;

        meal_plans::lock_user_plans(&mut *tx, plan.user_id).await?;
        let plan_id = meal_plans::insert_meal_plan(&mut *tx, plan).await?.id;
        let deactivated = deactivate_in_savepoint(&mut tx, plan.user_id, plan_id).await;

        tx.commit().await.context("failed to commit meal plan")?;

        Ok(PlanActivation {
            plan_id,
            deactivated,
        })
    }

    async fn insert_recipe(&self, recipe: &NewRecipe) -> Result<Uuid> {
        Ok(recipes::insert_recipe(&self.pool, recipe).await?.id)
    }

    async fn insert_meal_plan_item(&self, item: &NewMealPlanItem) -> Result<Uuid> {
        Ok(meal_plan_items::insert_meal_plan_item(&self.pool, item)
            .await?
            .id)
    }

    async fn insert_shopping_list(&self, list: &NewShoppingList) -> Result<Uuid> {
        Ok(shopping_lists::insert_shopping_list(&self.pool, list).await?.id)
    }

    async fn insert_shopping_list_item(&self, item: &NewShoppingListItem) -> Result<Uuid> {
        Ok(shopping_lists::insert_shopping_list_item(&self.pool, item)
            .await?
            .id)
    }
}

/// Run the deactivation in a savepoint so its failure does not abort the
/// surrounding transaction holding the new plan.
async fn deactivate_in_savepoint(
    conn: &mut PgConnection,
    user_id: Uuid,
    keep: Uuid,
) -> Result<u64> {
    let mut savepoint = conn.begin().await.context("failed to open savepoint")?;
    match meal_plans::deactivate_other_plans(&mut *savepoint, user_id, keep).await {
        Ok(n) => {
            savepoint.commit().await.context("failed to release savepoint")?;
            Ok(n)
        }
        Err(e) => {
            savepoint
                .rollback()
                .await
                .context("failed to roll back savepoint")?;
            Err(e)
        }
    }
}
