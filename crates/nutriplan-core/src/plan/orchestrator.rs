//! Meal plan generation: from an authenticated user to persisted plan rows.
//!
//! Hard failures (no identity, no profile, generator failure, plan row
//! insert) abort and leave nothing behind. Everything after the plan row is
//! best effort: failures are logged, counted in the [`GenerationSummary`],
//! and the plan is still returned.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use nutriplan_db::queries::meal_plan_items::NewMealPlanItem;
use nutriplan_db::queries::meal_plans::NewMealPlan;
use nutriplan_db::queries::shopping_lists::{NewShoppingList, NewShoppingListItem};

use crate::auth::Identity;
use crate::error::{ServiceError, ServiceResult};
use crate::generator::MealPlanGenerator;

use super::request::{GenerationOptions, GenerationRequest, build_request};
use super::sanitize::{SanitizedPlan, sanitize_plan};
use super::store::PlanStore;

/// What a generation run actually persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationSummary {
    pub meal_plan_id: Uuid,
    /// Days times meals per day, as requested.
    pub meals_expected: usize,
    /// Meals the generator returned.
    pub meals_generated: usize,
    pub meals_saved: usize,
    /// Meals rejected by validation or whose inserts failed.
    pub meals_skipped: usize,
    pub shopping_list_id: Option<Uuid>,
    pub shopping_items_saved: usize,
    pub shopping_items_skipped: usize,
    /// Whether older plans were switched off.
    pub deactivation_ok: bool,
}

impl GenerationSummary {
    /// True when every requested meal and the whole shopping list were saved.
    pub fn is_complete(&self) -> bool {
        self.meals_skipped == 0
            && self.meals_saved >= self.meals_expected
            && self.shopping_list_id.is_some()
            && self.shopping_items_skipped == 0
            && self.deactivation_ok
    }
}

// ---------------------------------------------------------------------------
// Per-user serialization
// ---------------------------------------------------------------------------

/// One async mutex per user, created on demand and dropped when idle.
///
/// Queues a process's own generations for a user before they reach the
/// store. Cross-process exclusion comes from
/// [`PlanStore::activate_new_plan`].
#[derive(Debug, Default)]
pub struct UserLocks {
    inner: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until no other holder for `user_id` remains.
    pub async fn lock(&self, user_id: Uuid) -> UserLockGuard<'_> {
        let mutex = Arc::clone(self.map().entry(user_id).or_default());
        let guard = mutex.lock_owned().await;
        UserLockGuard {
            locks: self,
            user_id,
            guard: Some(guard),
        }
    }

    /// Number of users with a live lock entry.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct UserLockGuard<'a> {
    locks: &'a UserLocks,
    user_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserLockGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut map = self.locks.map();
        let idle = map
            .get(&self.user_id)
            .is_some_and(|m| Arc::strong_count(m) == 1);
        if idle {
            map.remove(&self.user_id);
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct MealPlanOrchestrator {
    store: Arc<dyn PlanStore>,
    generator: Arc<dyn MealPlanGenerator>,
    locks: UserLocks,
}

impl MealPlanOrchestrator {
    pub fn new(store: Arc<dyn PlanStore>, generator: Arc<dyn MealPlanGenerator>) -> Self {
        Self {
            store,
            generator,
            locks: UserLocks::default(),
        }
    }

    pub fn generator(&self) -> &Arc<dyn MealPlanGenerator> {
        &self.generator
    }

    /// Generate a plan for the caller starting on `today` and persist it as
    /// their only active plan.
    pub async fn generate_meal_plan(
        &self,
        identity: Identity,
        options: &GenerationOptions,
        today: NaiveDate,
    ) -> ServiceResult<GenerationSummary> {
        let user_id = identity.require()?;

        let profile = self
            .store
            .load_profile(user_id)
            .await?
            .ok_or(ServiceError::ProfileNotFound)?;

        let request = build_request(&profile, options)?;
        let end_date = today
            .checked_add_days(Days::new(u64::from(request.number_of_days) - 1))
            .ok_or_else(|| ServiceError::invalid("plan end date is out of range"))?;

        tracing::info!(
            user_id = %user_id,
            generator = %self.generator.name(),
            days = request.number_of_days,
            meals_per_day = request.meals_per_day,
            "generating meal plan"
        );
        let candidate = self.generator.generate_plan(&request).await?;
        let sanitized = sanitize_plan(&candidate, request.number_of_days);

        let new_plan = NewMealPlan {
            user_id,
            name: sanitized
                .name
                .clone()
                .unwrap_or_else(|| format!("{}-Day Meal Plan", request.number_of_days)),
            description: sanitized.description.clone(),
            start_date: today,
            end_date,
            total_days: request.number_of_days as i32,
            avg_daily_calories: profile.daily_calories_target,
            avg_daily_protein_g: profile.daily_protein_g,
            avg_daily_carbs_g: profile.daily_carbs_g,
            avg_daily_fat_g: profile.daily_fat_g,
            estimated_total_cost: sanitized.total_estimated_cost,
            generation_prompt: Some(
                serde_json::to_value(&request).map_err(|e| ServiceError::Storage(e.into()))?,
            ),
        };

        let _guard = self.locks.lock(user_id).await;
        self.persist(user_id, &request, &new_plan, &sanitized).await
    }

    /// Steps that run under the user's lock, once the candidate is in hand.
    async fn persist(
        &self,
        user_id: Uuid,
        request: &GenerationRequest,
        new_plan: &NewMealPlan,
        plan: &SanitizedPlan,
    ) -> ServiceResult<GenerationSummary> {
        let activation = self
            .store
            .activate_new_plan(new_plan)
            .await
            .map_err(ServiceError::PlanPersistenceFailed)?;
        let plan_id = activation.plan_id;

        let deactivation_ok = match activation.deactivated {
            Ok(n) => {
                tracing::debug!(user_id = %user_id, plan_id = %plan_id, deactivated = n, "deactivated older plans");
                true
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    plan_id = %plan_id,
                    error = %e,
                    "failed to deactivate older plans; more than one plan may be active"
                );
                false
            }
        };

        for rejected in &plan.rejected {
            tracing::warn!(
                user_id = %user_id,
                plan_id = %plan_id,
                day = rejected.day,
                meal = %rejected.name,
                reason = %rejected.reason,
                "skipping invalid meal"
            );
        }

        let mut meals_saved = 0;
        let mut meals_failed = 0;
        for meal in &plan.meals {
            let mut recipe = meal.recipe.clone();
            recipe.created_by = Some(user_id);

            let recipe_id = match self.store.insert_recipe(&recipe).await {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(
                        user_id = %user_id,
                        plan_id = %plan_id,
                        meal = %recipe.name,
                        error = %e,
                        "failed to save recipe; skipping meal"
                    );
                    meals_failed += 1;
                    continue;
                }
            };

            let item = NewMealPlanItem {
                meal_plan_id: plan_id,
                recipe_id: Some(recipe_id),
                plan_date: new_plan.start_date + Days::new(u64::from(meal.day) - 1),
                meal_type: meal.meal_type,
                meal_order: meal.meal_order,
                servings: recipe.servings,
                recipe_name: Some(recipe.name.clone()),
                calories: recipe.calories,
            };
            match self.store.insert_meal_plan_item(&item).await {
                Ok(_) => meals_saved += 1,
                Err(e) => {
                    tracing::warn!(
                        user_id = %user_id,
                        plan_id = %plan_id,
                        meal = %recipe.name,
                        error = %e,
                        "failed to save meal plan item"
                    );
                    meals_failed += 1;
                }
            }
        }

        let list = NewShoppingList {
            user_id,
            meal_plan_id: Some(plan_id),
            name: format!("Shopping List - {}", new_plan.name),
            start_date: Some(new_plan.start_date),
            end_date: Some(new_plan.end_date),
            estimated_total_cost: plan.total_estimated_cost,
        };
        let shopping_list_id = match self.store.insert_shopping_list(&list).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    plan_id = %plan_id,
                    error = %e,
                    "failed to save shopping list"
                );
                None
            }
        };

        let mut shopping_items_saved = 0;
        let mut shopping_items_skipped = plan.shopping_items_rejected;
        if let Some(list_id) = shopping_list_id {
            for item in &plan.shopping_items {
                let new_item = NewShoppingListItem {
                    shopping_list_id: list_id,
                    ingredient_name: item.ingredient_name.clone(),
                    quantity: item.quantity,
                    unit: item.unit.clone(),
                    category: item.category.clone(),
                    estimated_cost: item.estimated_cost,
                    notes: None,
                };
                match self.store.insert_shopping_list_item(&new_item).await {
                    Ok(_) => shopping_items_saved += 1,
                    Err(e) => {
                        tracing::warn!(
                            user_id = %user_id,
                            plan_id = %plan_id,
                            item = %item.ingredient_name,
                            error = %e,
                            "failed to save shopping list item"
                        );
                        shopping_items_skipped += 1;
                    }
                }
            }
        } else {
            shopping_items_skipped += plan.shopping_items.len();
        }

        let summary = GenerationSummary {
            meal_plan_id: plan_id,
            meals_expected: request.expected_meals(),
            meals_generated: plan.meals_generated,
            meals_saved,
            meals_skipped: plan.rejected.len() + meals_failed,
            shopping_list_id,
            shopping_items_saved,
            shopping_items_skipped,
            deactivation_ok,
        };

        tracing::info!(
            user_id = %user_id,
            plan_id = %plan_id,
            expected = summary.meals_expected,
            generated = summary.meals_generated,
            saved = summary.meals_saved,
            skipped = summary.meals_skipped,
            shopping_items = summary.shopping_items_saved,
            complete = summary.is_complete(),
            "meal plan saved"
        );

        Ok(summary)
    }
}
